// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn host_spec_debug_includes_hostname_for_diagnostics() {
    let host = HostSpec {
        hostname: "build01".to_string(),
        user: "deploy".to_string(),
        identity_file: PathBuf::from("/home/deploy/.ssh/id_ed25519"),
    };
    let rendered = format!("{host:?}");
    assert!(rendered.contains("build01"));
    assert!(rendered.contains("deploy"));
}

#[tokio::test]
async fn connect_to_an_unroutable_host_surfaces_as_ssh_error() {
    let host = HostSpec {
        hostname: "203.0.113.254".to_string(),
        user: "nobody".to_string(),
        identity_file: PathBuf::from("/nonexistent/key"),
    };
    // ssh itself will refuse instantly on a missing identity file rather
    // than wait out the connect timeout.
    let result = connect(&host).await;
    assert!(result.is_err());
}
