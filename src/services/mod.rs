// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod body_parser;
pub mod logging;
pub mod upstream;
pub mod urlencoded;
