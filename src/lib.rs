// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod apply;
pub mod config;
pub mod constants;
pub mod error;
pub mod kubernetes;
pub mod mapping;
pub mod overlay;
pub mod reconcilers;
pub mod selector;
pub mod status;
pub mod template;
pub mod types;

#[cfg(test)]
pub mod test_utils;
