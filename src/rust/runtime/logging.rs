// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::flexi_logger::{
    Logger,
    LoggerHandle,
};
use ::std::sync::{
    Mutex,
    Once,
};

//==============================================================================
// Static Variables
//==============================================================================

/// Guardian to the logging initialize function.
static INIT_LOG: Once = Once::new();

/// Keeps the logger alive for the lifetime of the process.
static LOGGER: Mutex<Option<LoggerHandle>> = Mutex::new(None);

/// Log specification used when `RUST_LOG` is not set.
const DEFAULT_LOG_SPEC: &str = "info";

//==============================================================================
// Standalone Functions
//==============================================================================

/// Initializes logging features.
///
/// The log level is taken from the `RUST_LOG` environment variable. Calling this more than once is harmless, and a
/// failure to install the logger only costs us diagnostics, so it is reported on stderr rather than returned.
pub fn initialize() {
    INIT_LOG.call_once(|| match Logger::try_with_env_or_str(DEFAULT_LOG_SPEC).and_then(|logger| logger.start()) {
        Ok(handle) => {
            if let Ok(mut slot) = LOGGER.lock() {
                *slot = Some(handle);
            }
        },
        Err(e) => eprintln!("initialize(): failed to start logger ({:?})", e),
    });
}

//==============================================================================
// Unit Tests
//==============================================================================
