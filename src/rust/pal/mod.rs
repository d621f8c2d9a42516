// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// PAL: Platform Abstraction Layer
//======================================================================================================================

// Platform specific constants. Kept apart so that the packet core itself stays portable.

pub mod arch;
