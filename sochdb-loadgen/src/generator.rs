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

//! Item generators and the codec handed to backends.

use std::fmt;

use crate::error::CodecError;

/// Unbounded source of items to persist.
///
/// The orchestrator never looks inside an item; it only counts them. Each
/// writer receives its own generator obtained through [`Generator::split`],
/// so `next_item` is never called concurrently.
pub trait Generator: Send + 'static {
    /// Type of the generated items.
    type Item: Send + Sync + 'static;

    /// Produce the next item.
    fn next_item(&mut self) -> Self::Item;

    /// Derive an independent generator for one writer.
    fn split(&mut self) -> Self
    where
        Self: Sized;

    /// Serialize an item into the bytes a backend stores.
    fn serialize(item: &Self::Item) -> Vec<u8>;

    /// Rebuild an item from stored bytes.
    fn deserialize(bytes: &[u8]) -> Result<Self::Item, CodecError>;

    /// Identity of the generated type, used in reports.
    fn generated_type(&self) -> &'static str {
        std::any::type_name::<Self::Item>()
    }

    /// Codec bundling this generator's (de)serializers.
    fn codec(&self) -> Codec<Self::Item>
    where
        Self: Sized,
    {
        Codec::new(self.generated_type(), Self::serialize, Self::deserialize)
    }
}

/// Serializer/deserializer pair for one item type.
pub struct Codec<T> {
    type_name: &'static str,
    serialize: fn(&T) -> Vec<u8>,
    deserialize: fn(&[u8]) -> Result<T, CodecError>,
}

impl<T> Codec<T> {
    pub fn new(
        type_name: &'static str,
        serialize: fn(&T) -> Vec<u8>,
        deserialize: fn(&[u8]) -> Result<T, CodecError>,
    ) -> Self {
        Self {
            type_name,
            serialize,
            deserialize,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[inline]
    pub fn encode(&self, item: &T) -> Vec<u8> {
        (self.serialize)(item)
    }

    #[inline]
    pub fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        (self.deserialize)(bytes)
    }
}

// Manual impls: a derive would demand `T: Clone`.
impl<T> Clone for Codec<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Codec<T> {}

impl<T> fmt::Debug for Codec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec").field("type_name", &self.type_name).finish()
    }
}
