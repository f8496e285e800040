//! PostgreSQL v3 wire protocol messages.
//!
//! Reference: https://www.postgresql.org/docs/current/protocol-message-formats.html

use std::collections::HashMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::error::{PgError, PgResult};
use super::types::{Oid, PgValue};

/// PostgreSQL protocol version 3.0
pub const PROTOCOL_VERSION: i32 = 196608; // (3 << 16) | 0

/// Format codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum Format {
    Text = 0,
    Binary = 1,
}

/// Transaction status reported by ReadyForQuery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Idle,
    InTransaction,
    Failed,
}

impl From<u8> for TransactionStatus {
    fn from(b: u8) -> Self {
        match b {
            b'T' => TransactionStatus::InTransaction,
            b'E' => TransactionStatus::Failed,
            _ => TransactionStatus::Idle,
        }
    }
}

// ============================================================================
// Frontend (Client -> Server) Messages
// ============================================================================

pub trait FrontendMessage {
    fn encode(&self) -> BytesMut;
}

/// Wrap a message body with its tag byte and length prefix.
fn frame(tag: u8, body: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(body.len() + 5);
    buf.put_u8(tag);
    buf.put_i32(body.len() as i32 + 4);
    buf.put_slice(body);
    buf
}

fn put_cstring(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
}

/// Startup message sent at connection start (untagged).
#[derive(Debug, Clone)]
pub struct StartupMessage {
    pub user: String,
    pub database: Option<String>,
    pub options: Vec<(String, String)>,
}

impl FrontendMessage for StartupMessage {
    fn encode(&self) -> BytesMut {
        let mut body = BytesMut::new();
        body.put_i32(PROTOCOL_VERSION);

        put_cstring(&mut body, "user");
        put_cstring(&mut body, &self.user);
        if let Some(db) = &self.database {
            put_cstring(&mut body, "database");
            put_cstring(&mut body, db);
        }
        for (key, value) in &self.options {
            put_cstring(&mut body, key);
            put_cstring(&mut body, value);
        }
        body.put_u8(0);

        let mut buf = BytesMut::with_capacity(body.len() + 4);
        buf.put_i32(body.len() as i32 + 4);
        buf.put_slice(&body);
        buf
    }
}

/// Password message (cleartext or MD5 auth)
#[derive(Debug, Clone)]
pub struct PasswordMessage {
    pub password: String,
}

impl FrontendMessage for PasswordMessage {
    fn encode(&self) -> BytesMut {
        let mut body = BytesMut::new();
        put_cstring(&mut body, &self.password);
        frame(b'p', &body)
    }
}

/// Simple query ('Q')
#[derive(Debug, Clone)]
pub struct QueryMessage {
    pub query: String,
}

impl FrontendMessage for QueryMessage {
    fn encode(&self) -> BytesMut {
        let mut body = BytesMut::new();
        put_cstring(&mut body, &self.query);
        frame(b'Q', &body)
    }
}

/// Parse ('P') - creates a prepared statement
#[derive(Debug, Clone)]
pub struct ParseMessage {
    pub name: String,
    pub query: String,
    pub param_types: Vec<Oid>,
}

impl FrontendMessage for ParseMessage {
    fn encode(&self) -> BytesMut {
        let mut body = BytesMut::new();
        put_cstring(&mut body, &self.name);
        put_cstring(&mut body, &self.query);
        body.put_i16(self.param_types.len() as i16);
        for oid in &self.param_types {
            body.put_i32(oid.as_i32());
        }
        frame(b'P', &body)
    }
}

/// Bind ('B') - binds parameters to a prepared statement.
///
/// Each parameter is sent in its own format (see [`PgValue::format`]).
#[derive(Debug, Clone)]
pub struct BindMessage<'a> {
    pub portal: &'a str,
    pub statement: &'a str,
    pub params: &'a [PgValue],
    pub result_formats: Vec<Format>,
}

impl FrontendMessage for BindMessage<'_> {
    fn encode(&self) -> BytesMut {
        let mut body = BytesMut::new();
        put_cstring(&mut body, self.portal);
        put_cstring(&mut body, self.statement);

        body.put_i16(self.params.len() as i16);
        for param in self.params {
            body.put_i16(param.format() as i16);
        }

        body.put_i16(self.params.len() as i16);
        for param in self.params {
            if param.is_null() {
                body.put_i32(-1);
            } else {
                let encoded = param.encode();
                body.put_i32(encoded.len() as i32);
                body.put_slice(&encoded);
            }
        }

        body.put_i16(self.result_formats.len() as i16);
        for fmt in &self.result_formats {
            body.put_i16(*fmt as i16);
        }
        frame(b'B', &body)
    }
}

/// Execute ('E') - runs a bound portal
#[derive(Debug, Clone)]
pub struct ExecuteMessage {
    pub portal: String,
    /// 0 = no limit
    pub max_rows: i32,
}

impl FrontendMessage for ExecuteMessage {
    fn encode(&self) -> BytesMut {
        let mut body = BytesMut::new();
        put_cstring(&mut body, &self.portal);
        body.put_i32(self.max_rows);
        frame(b'E', &body)
    }
}

/// Describe ('D') - request description of statement or portal
#[derive(Debug, Clone)]
pub struct DescribeMessage {
    /// 'S' for statement, 'P' for portal
    pub kind: u8,
    pub name: String,
}

impl FrontendMessage for DescribeMessage {
    fn encode(&self) -> BytesMut {
        let mut body = BytesMut::new();
        body.put_u8(self.kind);
        put_cstring(&mut body, &self.name);
        frame(b'D', &body)
    }
}

/// Close ('C') - drop a server-side prepared statement
#[derive(Debug, Clone)]
pub struct CloseMessage {
    pub name: String,
}

impl FrontendMessage for CloseMessage {
    fn encode(&self) -> BytesMut {
        let mut body = BytesMut::new();
        body.put_u8(b'S');
        put_cstring(&mut body, &self.name);
        frame(b'C', &body)
    }
}

/// Sync ('S') - end of an extended query
#[derive(Debug, Clone, Copy)]
pub struct SyncMessage;

impl FrontendMessage for SyncMessage {
    fn encode(&self) -> BytesMut {
        frame(b'S', &[])
    }
}

/// Terminate ('X')
#[derive(Debug, Clone, Copy)]
pub struct TerminateMessage;

impl FrontendMessage for TerminateMessage {
    fn encode(&self) -> BytesMut {
        frame(b'X', &[])
    }
}

/// SASLInitialResponse ('p') - first SCRAM message
#[derive(Debug, Clone)]
pub struct SaslInitialResponseMessage {
    pub mechanism: String,
    pub data: Vec<u8>,
}

impl FrontendMessage for SaslInitialResponseMessage {
    fn encode(&self) -> BytesMut {
        let mut body = BytesMut::new();
        put_cstring(&mut body, &self.mechanism);
        body.put_i32(self.data.len() as i32);
        body.put_slice(&self.data);
        frame(b'p', &body)
    }
}

/// SASLResponse ('p') - subsequent SCRAM messages
#[derive(Debug, Clone)]
pub struct SaslResponseMessage {
    pub data: Vec<u8>,
}

impl FrontendMessage for SaslResponseMessage {
    fn encode(&self) -> BytesMut {
        frame(b'p', &self.data)
    }
}

// ============================================================================
// Backend (Server -> Client) Messages
// ============================================================================

/// Field description in a RowDescription message
#[derive(Debug, Clone)]
pub struct FieldDescription {
    pub name: String,
    pub table_oid: i32,
    pub column_attr: i16,
    pub type_oid: Oid,
    pub type_size: i16,
    pub type_modifier: i32,
    pub format: Format,
}

#[derive(Debug, Clone)]
pub enum BackendMessage {
    AuthenticationOk,
    AuthenticationCleartextPassword,
    AuthenticationMD5Password { salt: [u8; 4] },
    AuthenticationSASL { mechanisms: Vec<String> },
    AuthenticationSASLContinue { data: Bytes },
    AuthenticationSASLFinal { data: Bytes },

    RowDescription { fields: Vec<FieldDescription> },
    DataRow { values: Vec<Option<Bytes>> },
    CommandComplete { tag: String },
    EmptyQueryResponse,

    ParseComplete,
    BindComplete,
    CloseComplete,
    NoData,
    PortalSuspended,
    ParameterDescription { type_oids: Vec<Oid> },

    ReadyForQuery { status: TransactionStatus },
    ParameterStatus { name: String, value: String },
    BackendKeyData { process_id: i32, secret_key: i32 },

    ErrorResponse { fields: HashMap<u8, String> },
    NoticeResponse { fields: HashMap<u8, String> },
    NotificationResponse { process_id: i32, channel: String, payload: String },
}

impl BackendMessage {
    /// Decode one complete backend message, starting at its type byte.
    pub fn decode(buf: &mut Bytes) -> PgResult<Self> {
        if buf.remaining() < 5 {
            return Err(PgError::Protocol("Incomplete message header".to_string()));
        }

        let msg_type = buf.get_u8();
        let len = buf.get_i32();
        if len < 4 || buf.remaining() < len as usize - 4 {
            return Err(PgError::Protocol("Incomplete message body".to_string()));
        }
        let mut body = buf.split_to(len as usize - 4);

        let msg = match msg_type {
            b'R' => Self::decode_auth(body)?,
            b'T' => Self::decode_row_description(&mut body)?,
            b'D' => {
                let count = take_i16(&mut body)?.max(0) as usize;
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    let len = take_i32(&mut body)?;
                    if len < 0 {
                        values.push(None);
                    } else {
                        ensure(&body, len as usize)?;
                        values.push(Some(body.split_to(len as usize)));
                    }
                }
                BackendMessage::DataRow { values }
            }
            b'C' => BackendMessage::CommandComplete {
                tag: read_cstring(&mut body)?,
            },
            b'Z' => {
                ensure(&body, 1)?;
                BackendMessage::ReadyForQuery {
                    status: TransactionStatus::from(body.get_u8()),
                }
            }
            b'E' => BackendMessage::ErrorResponse {
                fields: read_fields(body)?,
            },
            b'N' => BackendMessage::NoticeResponse {
                fields: read_fields(body)?,
            },
            b'S' => BackendMessage::ParameterStatus {
                name: read_cstring(&mut body)?,
                value: read_cstring(&mut body)?,
            },
            b'K' => BackendMessage::BackendKeyData {
                process_id: take_i32(&mut body)?,
                secret_key: take_i32(&mut body)?,
            },
            b't' => {
                let count = take_i16(&mut body)?.max(0) as usize;
                let mut type_oids = Vec::with_capacity(count);
                for _ in 0..count {
                    type_oids.push(Oid::from_i32(take_i32(&mut body)?));
                }
                BackendMessage::ParameterDescription { type_oids }
            }
            b'A' => BackendMessage::NotificationResponse {
                process_id: take_i32(&mut body)?,
                channel: read_cstring(&mut body)?,
                payload: read_cstring(&mut body)?,
            },
            b'1' => BackendMessage::ParseComplete,
            b'2' => BackendMessage::BindComplete,
            b'3' => BackendMessage::CloseComplete,
            b'I' => BackendMessage::EmptyQueryResponse,
            b'n' => BackendMessage::NoData,
            b's' => BackendMessage::PortalSuspended,
            other => {
                return Err(PgError::Protocol(format!(
                    "Unknown message type: {}",
                    other as char
                )))
            }
        };
        Ok(msg)
    }

    fn decode_auth(mut body: Bytes) -> PgResult<Self> {
        match take_i32(&mut body)? {
            0 => Ok(BackendMessage::AuthenticationOk),
            3 => Ok(BackendMessage::AuthenticationCleartextPassword),
            5 => {
                ensure(&body, 4)?;
                let mut salt = [0u8; 4];
                body.copy_to_slice(&mut salt);
                Ok(BackendMessage::AuthenticationMD5Password { salt })
            }
            10 => {
                let mut mechanisms = Vec::new();
                while body.has_remaining() {
                    let mechanism = read_cstring(&mut body)?;
                    if mechanism.is_empty() {
                        break;
                    }
                    mechanisms.push(mechanism);
                }
                Ok(BackendMessage::AuthenticationSASL { mechanisms })
            }
            11 => Ok(BackendMessage::AuthenticationSASLContinue { data: body }),
            12 => Ok(BackendMessage::AuthenticationSASLFinal { data: body }),
            other => Err(PgError::Protocol(format!(
                "Unsupported authentication type: {}",
                other
            ))),
        }
    }

    fn decode_row_description(body: &mut Bytes) -> PgResult<Self> {
        let count = take_i16(body)?.max(0) as usize;
        let mut fields = Vec::with_capacity(count);

        for _ in 0..count {
            let name = read_cstring(body)?;
            ensure(body, 18)?;
            fields.push(FieldDescription {
                name,
                table_oid: body.get_i32(),
                column_attr: body.get_i16(),
                type_oid: Oid::from_i32(body.get_i32()),
                type_size: body.get_i16(),
                type_modifier: body.get_i32(),
                format: if body.get_i16() == 0 {
                    Format::Text
                } else {
                    Format::Binary
                },
            });
        }

        Ok(BackendMessage::RowDescription { fields })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn ensure(buf: &Bytes, needed: usize) -> PgResult<()> {
    if buf.remaining() < needed {
        return Err(PgError::Protocol("Truncated message".to_string()));
    }
    Ok(())
}

fn take_i16(buf: &mut Bytes) -> PgResult<i16> {
    ensure(buf, 2)?;
    Ok(buf.get_i16())
}

fn take_i32(buf: &mut Bytes) -> PgResult<i32> {
    ensure(buf, 4)?;
    Ok(buf.get_i32())
}

/// Read a null-terminated string from the buffer.
fn read_cstring(buf: &mut Bytes) -> PgResult<String> {
    let end = buf
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| PgError::Protocol("Missing null terminator in string".to_string()))?;

    let s = String::from_utf8_lossy(&buf[..end]).into_owned();
    buf.advance(end + 1);
    Ok(s)
}

/// Read error/notice response fields
fn read_fields(mut body: Bytes) -> PgResult<HashMap<u8, String>> {
    let mut fields = HashMap::new();

    while body.has_remaining() {
        let field_type = body.get_u8();
        if field_type == 0 {
            break;
        }
        fields.insert(field_type, read_cstring(&mut body)?);
    }

    Ok(fields)
}
