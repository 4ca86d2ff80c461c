pub mod contract_logs;
pub mod postgres;
pub mod rpc;

pub use contract_logs::{decode_log, decode_logs};
pub use postgres::PostgresStore;
pub use rpc::RpcEventSource;
