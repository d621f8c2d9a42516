// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

// This file is for CPU architecture-specific things.

// ------------------------
// CPU Data Cache Line Size
// ------------------------
::cfg_if::cfg_if! {
    if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
        pub const CPU_DATA_CACHE_LINE_SIZE: usize = 64;
    } else if #[cfg(all(target_arch = "aarch64", target_vendor = "apple"))] {
        pub const CPU_DATA_CACHE_LINE_SIZE: usize = 128;
    } else {
        pub const CPU_DATA_CACHE_LINE_SIZE: usize = 64;
    }
}
