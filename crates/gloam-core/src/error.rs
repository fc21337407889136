// Copyright 2025 eraflo
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

//! Error types for the foundational contracts.

use thiserror::Error;

/// Errors raised while setting up core registries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Every one of the 32 layer slots is already named.
    #[error("layer table is full ({capacity} layers); cannot register '{name}'")]
    LayerTableFull {
        /// The name that could not be registered.
        name: String,
        /// Total number of slots.
        capacity: usize,
    },
    /// A layer with this name already exists.
    #[error("layer '{0}' is already registered")]
    DuplicateLayer(String),
}
