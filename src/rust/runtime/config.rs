// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    memory::PoolConfig,
};
use ::std::{
    fs,
    ops::Index,
};
use ::yaml_rust::{
    Yaml,
    YamlLoader,
};

//======================================================================================================================
// Constants
//======================================================================================================================

// Packet pool options.
mod packet_pool_config {
    pub const SECTION_NAME: &str = "packet_pool";
    pub const LOCAL_CAPACITY: &str = "local_capacity";
    pub const GLOBAL_BATCHES: &str = "global_batches";
    pub const BUFFER_SIZE: &str = "buffer_size";
    pub const MIN_BUFFER_LENGTH: &str = "min_buffer_length";
    pub const GROWTH_SLACK: &str = "growth_slack";
}

//======================================================================================================================
// Structures
//======================================================================================================================

/// Packet core configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Yaml);

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Config {
    /// Reads a configuration file into a [Config] object.
    pub fn new(config_path: &str) -> Result<Self, Fail> {
        let config_s: String = fs::read_to_string(config_path)?;
        Self::from_str(&config_s)
    }

    /// Parses a configuration document.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(config_s: &str) -> Result<Self, Fail> {
        let config: Vec<Yaml> = YamlLoader::load_from_str(config_s).map_err(|e| {
            let message: String = format!("failed to parse configuration ({})", e);
            error!("from_str(): {}", message);
            Fail::new(libc::EINVAL, &message)
        })?;
        match &config[..] {
            [config_obj] => Ok(Self(config_obj.clone())),
            _ => Err(Fail::new(libc::EINVAL, "Wrong number of config objects")),
        }
    }

    /// Reads the packet pool section. The section and each of its keys are optional; missing ones take the default.
    pub fn pool_config(&self) -> Result<PoolConfig, Fail> {
        let mut config: PoolConfig = PoolConfig::default();
        let section: &Yaml = match self.0.index(packet_pool_config::SECTION_NAME) {
            Yaml::BadValue => {
                debug!("pool_config(): no packet pool section, using defaults");
                return Ok(config);
            },
            section @ Yaml::Hash(_) => section,
            _ => {
                let message: String = format!("parameter \"{}\" has unexpected type", packet_pool_config::SECTION_NAME);
                return Err(Fail::new(libc::EINVAL, &message));
            },
        };

        let fields: [(&str, &mut usize); 5] = [
            (packet_pool_config::LOCAL_CAPACITY, &mut config.local_capacity),
            (packet_pool_config::GLOBAL_BATCHES, &mut config.global_batches),
            (packet_pool_config::BUFFER_SIZE, &mut config.buffer_size),
            (packet_pool_config::MIN_BUFFER_LENGTH, &mut config.min_buffer_length),
            (packet_pool_config::GROWTH_SLACK, &mut config.growth_slack),
        ];
        for (index, field) in fields {
            if let Some(value) = Self::get_int_option(section, index)? {
                *field = value;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Index `yaml` to find an optional integer at `index`, verifying that it fits the destination type.
    fn get_int_option<T: TryFrom<i64>>(yaml: &Yaml, index: &str) -> Result<Option<T>, Fail> {
        let val: i64 = match yaml.index(index) {
            Yaml::BadValue => return Ok(None),
            Yaml::Integer(val) => *val,
            _ => {
                let message: String = format!("parameter {} has unexpected type", index);
                return Err(Fail::new(libc::EINVAL, message.as_str()));
            },
        };
        match T::try_from(val) {
            Ok(val) => Ok(Some(val)),
            _ => {
                let message: String = format!("parameter \"{}\" is out of range", index);
                Err(Fail::new(libc::ERANGE, message.as_str()))
            },
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
