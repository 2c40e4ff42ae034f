//! Server binary flags, in the teacher's `clap` idiom
//! (`mock/control-api/src/main.rs`'s `app_from_crate!` + `Arg::with_name`).

use clap::{app_from_crate, crate_authors, crate_description, crate_name, crate_version, Arg, ArgMatches};

#[must_use]
pub fn parse_args() -> ArgMatches<'static> {
    app_from_crate!()
        .arg(
            Arg::with_name("config")
                .help("Path to a configuration file (YAML), overridden by environment.")
                .long("config")
                .short("f"),
        )
        .arg(
            Arg::with_name("http_addr")
                .help("Address to host the HTTP webhook/WebSocket surface on.")
                .long("http-addr")
                .short("a"),
        )
        .arg(
            Arg::with_name("grpc_addr")
                .help("Address to host the WebRTC signaling gRPC service on.")
                .long("grpc-addr")
                .short("g"),
        )
        .arg(
            Arg::with_name("json_logs")
                .help("Emit JSON-formatted logs instead of the terminal format.")
                .long("json-logs"),
        )
        .get_matches()
}
