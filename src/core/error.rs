// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// SPU core error types
use thiserror::Error;

/// Result type for SPU core operations.
pub type Result<T> = std::result::Result<T, SpuError>;

/// Errors surfaced by the SPU core and its narrow host collaborators.
///
/// None of these are raised from inside the sample loop itself (see
/// `SPEC_FULL.md` §7): register and RAM access never fail, they log and
/// return a default. These variants exist for the collaborators at the
/// edges - dump files and save-state streams.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpuError {
    /// The host audio output device could not be opened.
    #[error("audio device unavailable: {message}")]
    AudioDeviceUnavailable {
        /// Human-readable reason from the backend.
        message: String,
    },

    /// The audio dump writer failed to open its output file.
    #[error("failed to open audio dump '{path}': {message}")]
    DumpOpenFailed {
        /// Path that failed to open.
        path: String,
        /// Human-readable reason.
        message: String,
    },

    /// A save-state stream failed to read or write a field.
    #[error("save state error: {message}")]
    SaveStateError {
        /// Human-readable reason.
        message: String,
    },

    /// Generic I/O error (file operations).
    #[error("I/O error: {message}")]
    IoError {
        /// Error message.
        message: String,
    },
}

impl From<std::io::Error> for SpuError {
    fn from(err: std::io::Error) -> Self {
        SpuError::IoError { message: err.to_string() }
    }
}
