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

//! Error type for runtime dispatch resolution.

use std::fmt;

/// No consumer matched the target identifier carried by an event.
///
/// Returned by [`dynamic_dispatch!`](crate::dynamic_dispatch) and by
/// [`Sender::send`](crate::Sender::send) when the event is targeted. The
/// event itself is discarded; the unmatched identifier is all that remains
/// to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchError {
    /// The target identifier no candidate consumer matched.
    pub target: usize,
}

impl DispatchError {
    /// Creates an error for the given unmatched target identifier.
    pub fn new(target: usize) -> Self {
        Self { target }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no consumer matched target identifier {}", self.target)
    }
}

impl std::error::Error for DispatchError {}
