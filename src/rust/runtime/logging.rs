// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::flexi_logger::Logger;
use ::std::sync::Once;

//==============================================================================
// Static Variables
//==============================================================================

/// Guardian to the logging initialize function.
static INIT_LOG: Once = Once::new();

//==============================================================================
// Standalone Functions
//==============================================================================

/// Initializes logging features. The log specification is read from `RUST_LOG`, defaulting to warnings only.
pub fn initialize() {
    INIT_LOG.call_once(|| {
        match Logger::try_with_env_or_str("warn").and_then(|logger| logger.start()) {
            // The handle must outlive every log call, so it is never dropped.
            Ok(handle) => ::std::mem::forget(handle),
            Err(e) => eprintln!("failed to initialize logger: {:?}", e),
        }
    });
}
