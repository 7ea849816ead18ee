// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Cross-Origin Resource Sharing (CORS) support
//!
//! The dashboard front end may be served from another origin than the API,
//! so every response carries permissive CORS headers.

use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{options, Request, Response};
use std::path::PathBuf;

/// Fairing adding CORS headers to every response
pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        // The API is read-only
        response.set_header(Header::new("Access-Control-Allow-Methods", "GET, OPTIONS"));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/// Answers to CORS preflight requests
#[options("/<_path..>")]
pub async fn options(_path: PathBuf) {}
