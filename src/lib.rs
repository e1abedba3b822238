// Library root
// -----------
// The binary (`main.rs`) is a thin shell over these modules:
//
// - `error`: classification of remote failures and the remediation hints
//   shown to the user.
// - `types`: persisted records (account, session) and the typed views of
//   the server's response payloads.
// - `store`: JSON state files in the per-user config directory.
// - `gateway`: the blocking HTTP layer; everything network-shaped goes
//   through the `Backend` trait so the client logic can be tested against
//   a fake.
// - `client`: the orchestrator; decides which stored state rides along
//   with each request and what gets written back afterwards.
// - `cli`: argument surface, interactive prompts and terminal output.
pub mod cli;
pub mod client;
pub mod error;
pub mod gateway;
pub mod store;
pub mod types;
