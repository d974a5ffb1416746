use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::error::Result;
use crate::stream::{EXIT_STREAM, GROUP, SPAWN_STREAM};
use crate::worker::executor::{epoch_seconds, ExecutionReport};

/// One entry for the exit stream.
#[derive(Debug)]
pub struct ExitResponse {
    pub id: String,
    pub pid: i32,
    pub code: i64,
    pub output: Vec<u8>,
    pub exec_start: f64,
    pub exec_end: f64,
}

impl ExitResponse {
    pub fn from_report(id: String, report: ExecutionReport) -> Self {
        Self {
            id,
            pid: report.pid,
            code: report.code,
            output: report.output,
            exec_start: report.exec_start,
            exec_end: report.exec_end,
        }
    }

    /// Synthetic response for a request that never spawned a child: parse
    /// rejection or spawn failure. The annotation names this worker so the
    /// failing instance can be found in a fleet.
    pub fn failure(id: String, identity: Uuid, reason: &str) -> Self {
        let now = epoch_seconds(Utc::now());
        Self {
            id,
            pid: -1,
            code: 128,
            output: format!("[Icinga 2 process manager {}] {}", identity, reason).into_bytes(),
            exec_start: now,
            exec_end: now,
        }
    }

    fn fields(&self) -> Vec<(&'static str, Vec<u8>)> {
        vec![
            ("id", self.id.clone().into_bytes()),
            ("pid", self.pid.to_string().into_bytes()),
            ("code", self.code.to_string().into_bytes()),
            ("output", self.output.clone()),
            ("exec_start", self.exec_start.to_string().into_bytes()),
            ("exec_end", self.exec_end.to_string().into_bytes()),
        ]
    }
}

/// Append the response to the exit stream and acknowledge the input
/// message as one atomic pipelined transaction, so a response can never be
/// committed without its ack or vice versa.
pub async fn publish_and_ack(
    conn: &mut MultiplexedConnection,
    message_id: &str,
    response: &ExitResponse,
) -> Result<()> {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .xadd(EXIT_STREAM, "*", &response.fields())
        .ignore()
        .xack(SPAWN_STREAM, GROUP, &[message_id])
        .ignore();

    let _: () = pipe.query_async(conn).await?;
    Ok(())
}

/// Acknowledge a message that cannot be answered (no usable request id).
pub async fn ack_only(conn: &mut MultiplexedConnection, message_id: &str) -> Result<()> {
    let _: i64 = conn.xack(SPAWN_STREAM, GROUP, &[message_id]).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_response_names_the_worker() {
        let identity = Uuid::new_v4();
        let response = ExitResponse::failure("r1".to_string(), identity, "Bad command spec");

        assert_eq!(response.pid, -1);
        assert_eq!(response.code, 128);
        assert_eq!(response.exec_start, response.exec_end);

        let output = String::from_utf8(response.output).unwrap();
        assert!(output.starts_with(&format!("[Icinga 2 process manager {}]", identity)));
        assert!(output.contains("Bad command spec"));
    }

    #[test]
    fn fields_render_decimal_values() {
        let response = ExitResponse {
            id: "r2".to_string(),
            pid: 4711,
            code: 137,
            output: b"hi\n".to_vec(),
            exec_start: 1_700_000_000.25,
            exec_end: 1_700_000_000.5,
        };

        let fields = response.fields();
        let value = |name: &str| {
            let (_, v) = fields.iter().find(|(n, _)| *n == name).unwrap();
            String::from_utf8(v.clone()).unwrap()
        };

        assert_eq!(value("pid"), "4711");
        assert_eq!(value("code"), "137");
        assert_eq!(value("exec_start"), "1700000000.25");
        assert_eq!(value("exec_end"), "1700000000.5");
        assert_eq!(value("output"), "hi\n");
    }
}
