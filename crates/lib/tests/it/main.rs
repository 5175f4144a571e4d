/*! Integration tests for Lineage.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - graph: Tests for graph construction, mutation, and the event pipeline
 * - identity: Tests for stable item identity through the graph API
 * - overrides: Tests for override marking, queries, and restore paths
 * - reconcile: Tests for base/derived propagation and reconciliation
 * - path: Tests for structural path resolution
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("lineage=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod graph;
mod helpers;
mod overrides;
mod path;
