// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Packet buffers for a graph of packet-processing stages: bounded byte windows with annotations and header
//! markers, copy-on-write sharing, and a per-worker recycling allocator.

#![cfg_attr(feature = "strict", deny(warnings))]
#![deny(clippy::all)]

#[macro_use]
extern crate log;

pub mod pal;
pub mod runtime;

pub use self::runtime::{
    config::Config,
    fail::Fail,
    memory::{
        annotation,
        headers,
        pool,
        Annotations,
        DeviceId,
        HeaderMarkers,
        Packet,
        PacketType,
        PoolConfig,
        PoolStats,
        WritablePacket,
    },
};
pub use ::eui48::MacAddress;

/// Returns an error from the enclosing function if the two expressions are not equal.
#[macro_export]
macro_rules! ensure_eq {
    ($left:expr, $right:expr $(,)?) => {{
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    ::anyhow::bail!(
                        "ensure failed: `(left == right)` left: `{:?}`, right: `{:?}` at {}:{}",
                        left_val,
                        right_val,
                        file!(),
                        line!()
                    );
                }
            },
        }
    }};
}

/// Returns an error from the enclosing function if the two expressions are equal.
#[macro_export]
macro_rules! ensure_neq {
    ($left:expr, $right:expr $(,)?) => {{
        match (&$left, &$right) {
            (left_val, right_val) => {
                if *left_val == *right_val {
                    ::anyhow::bail!(
                        "ensure failed: `(left != right)` left: `{:?}`, right: `{:?}` at {}:{}",
                        left_val,
                        right_val,
                        file!(),
                        line!()
                    );
                }
            },
        }
    }};
}
