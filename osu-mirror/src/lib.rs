// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

pub mod config;
pub mod error;
pub mod filter;
pub mod source;
pub mod sync;
