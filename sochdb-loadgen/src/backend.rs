// SPDX-License-Identifier: AGPL-3.0-or-later
// SochDB - LLM-Optimized Embedded Database
// Copyright (C) 2026 Sushanth Reddy Vanagala (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Backend capability contract.
//!
//! A [`Backend`] is a factory; each writer of a run gets a fresh
//! [`BackendHandle`] from it. Handles are shared between their writer and any
//! number of readers, so every operation takes `&self`.
//!
//! Log sinks that cannot be read back leave [`BackendHandle::iterate_all`] at
//! its default and report `false` from [`Backend::supports_iteration`]; runs
//! check the latter before any worker exists.

use crate::error::BackendError;
use crate::generator::Codec;

/// Lazy, finite sequence of decoded items. Dropping it closes the iteration.
pub type ItemIter<'a, T> = Box<dyn Iterator<Item = Result<T, BackendError>> + 'a>;

/// Factory for per-writer handles.
pub trait Backend<T>: Send + Sync {
    type Handle: BackendHandle<T>;

    /// Short name for logs and reports.
    fn name(&self) -> &str;

    /// Whether handles can be iterated by readers.
    fn supports_iteration(&self) -> bool;

    /// Open a fresh store/log target that encodes items with `codec`.
    fn create(&self, codec: Codec<T>) -> Result<Self::Handle, BackendError>;
}

/// One open store/log target.
pub trait BackendHandle<T>: Send + Sync + 'static {
    /// Persist one item.
    fn append(&self, item: &T) -> Result<(), BackendError>;

    /// Iterate everything appended so far.
    ///
    /// A writer may still be appending; the iteration sees some prefix of its
    /// items.
    fn iterate_all(&self) -> Result<ItemIter<'_, T>, BackendError> {
        Err(BackendError::Unsupported {
            backend: std::any::type_name::<Self>().to_string(),
            operation: "iteration",
        })
    }

    /// Release the underlying resources. Called once, after all workers of
    /// the run completed.
    fn close(&self) -> Result<(), BackendError>;
}
