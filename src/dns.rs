//! DNS message parsing and construction.

use crate::error::RelayError;

const HEADER_LEN: usize = 12;

/// QR bit in the flags word.
const FLAG_RESPONSE: u16 = 0x8000;
/// RCODE occupies the low nibble of the flags word.
const RCODE_MASK: u16 = 0x000F;

pub const RCODE_SERVFAIL: u8 = 2;
pub const RCODE_REFUSED: u8 = 5;

const MAX_NAME_LEN: usize = 255;
const MAX_LABEL_LEN: usize = 63;
/// Compression pointer chains longer than this are treated as loops.
const MAX_POINTER_JUMPS: usize = 5;

/// A DNS message header.
///
/// Flags are kept as the raw wire word so a query's opcode and recursion
/// bits survive the round trip untouched; only the response bit and the
/// response code have accessors, because those are the two fields the relay
/// deliberately rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub flags: u16,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl Header {
    /// Parse the fixed 12-byte header.
    pub fn parse(data: &[u8]) -> Result<Self, RelayError> {
        if data.len() < HEADER_LEN {
            return Err(RelayError::infra("truncated header"));
        }

        Ok(Self {
            id: u16::from_be_bytes([data[0], data[1]]),
            flags: u16::from_be_bytes([data[2], data[3]]),
            qdcount: u16::from_be_bytes([data[4], data[5]]),
            ancount: u16::from_be_bytes([data[6], data[7]]),
            nscount: u16::from_be_bytes([data[8], data[9]]),
            arcount: u16::from_be_bytes([data[10], data[11]]),
        })
    }

    pub fn is_response(&self) -> bool {
        self.flags & FLAG_RESPONSE != 0
    }

    pub fn set_response(&mut self, response: bool) {
        if response {
            self.flags |= FLAG_RESPONSE;
        } else {
            self.flags &= !FLAG_RESPONSE;
        }
    }

    pub fn rcode(&self) -> u8 {
        (self.flags & RCODE_MASK) as u8
    }

    pub fn set_rcode(&mut self, rcode: u8) {
        self.flags = (self.flags & !RCODE_MASK) | (rcode as u16 & RCODE_MASK);
    }
}

/// A question section entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

/// A resource record, parsed far enough to prove the message is well formed.
#[derive(Debug, Clone)]
pub struct Record {
    pub name: String,
    pub rtype: u16,
    pub class: u16,
    pub ttl: u32,
    pub rdata: Vec<u8>,
}

/// Read the transaction ID without a full parse.
///
/// Lets a transaction log be opened even when the rest of the message turns
/// out to be garbage.
pub fn transaction_id(data: &[u8]) -> Result<u16, RelayError> {
    if data.len() < HEADER_LEN {
        return Err(RelayError::infra("truncated header"));
    }

    Ok(u16::from_be_bytes([data[0], data[1]]))
}

/// Parse a query: header plus every question record.
pub fn decode_query(data: &[u8]) -> Result<(Header, Vec<Question>), RelayError> {
    let header = Header::parse(data)?;

    let mut questions = Vec::with_capacity(header.qdcount as usize);
    let mut pos = HEADER_LEN;

    for _ in 0..header.qdcount {
        let (question, next) = parse_question(data, pos)?;
        questions.push(question);
        pos = next;
    }

    Ok((header, questions))
}

/// Parse a response: header, skip the question section, then every answer
/// record.
///
/// The records are returned for the caller to count, not to interpret - the
/// relay forwards the original bytes, never a re-encoding of these.
pub fn decode_response(data: &[u8]) -> Result<(Header, Vec<Record>), RelayError> {
    let header = Header::parse(data)?;

    let mut pos = HEADER_LEN;
    for _ in 0..header.qdcount {
        let (_, next) = parse_question(data, pos)?;
        pos = next;
    }

    let mut answers = Vec::with_capacity(header.ancount as usize);
    for _ in 0..header.ancount {
        let (record, next) = parse_record(data, pos)?;
        answers.push(record);
        pos = next;
    }

    Ok((header, answers))
}

/// Serialize a header and at most one question back to wire format.
///
/// Section counts are derived from what is actually written, so a header
/// lifted from a decoded message cannot claim records this encoder never
/// emits (rebuilding a query that carried an OPT record drops the record
/// and its count together).
pub fn encode(header: &Header, question: Option<&Question>) -> Result<Vec<u8>, RelayError> {
    let mut data = Vec::with_capacity(HEADER_LEN + question.map_or(0, |q| q.name.len() + 6));

    data.extend_from_slice(&header.id.to_be_bytes());
    data.extend_from_slice(&header.flags.to_be_bytes());
    let qdcount: u16 = if question.is_some() { 1 } else { 0 };
    data.extend_from_slice(&qdcount.to_be_bytes());
    data.extend_from_slice(&[0x00, 0x00]); // ANCOUNT
    data.extend_from_slice(&[0x00, 0x00]); // NSCOUNT
    data.extend_from_slice(&[0x00, 0x00]); // ARCOUNT

    if let Some(q) = question {
        encode_name(&mut data, &q.name)?;
        data.extend_from_slice(&q.qtype.to_be_bytes());
        data.extend_from_slice(&q.qclass.to_be_bytes());
    }

    Ok(data)
}

fn parse_question(data: &[u8], pos: usize) -> Result<(Question, usize), RelayError> {
    let (name, pos) = parse_name(data, pos)?;

    if pos + 4 > data.len() {
        return Err(RelayError::infra("truncated question"));
    }
    let qtype = u16::from_be_bytes([data[pos], data[pos + 1]]);
    let qclass = u16::from_be_bytes([data[pos + 2], data[pos + 3]]);

    Ok((
        Question {
            name,
            qtype,
            qclass,
        },
        pos + 4,
    ))
}

fn parse_record(data: &[u8], pos: usize) -> Result<(Record, usize), RelayError> {
    let (name, pos) = parse_name(data, pos)?;

    if pos + 10 > data.len() {
        return Err(RelayError::infra("truncated record"));
    }
    let rtype = u16::from_be_bytes([data[pos], data[pos + 1]]);
    let class = u16::from_be_bytes([data[pos + 2], data[pos + 3]]);
    let ttl = u32::from_be_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]);
    let rdlength = u16::from_be_bytes([data[pos + 8], data[pos + 9]]) as usize;

    let rdata_start = pos + 10;
    let rdata_end = rdata_start + rdlength;
    if rdata_end > data.len() {
        return Err(RelayError::infra("truncated rdata"));
    }

    Ok((
        Record {
            name,
            rtype,
            class,
            ttl,
            rdata: data[rdata_start..rdata_end].to_vec(),
        },
        rdata_end,
    ))
}

/// Parse a (possibly compressed) domain name starting at `start`.
///
/// Returns the name and the offset just past it in the original label run.
/// Case is preserved; normalization is a matcher concern, not a codec one.
fn parse_name(data: &[u8], start: usize) -> Result<(String, usize), RelayError> {
    let mut name = String::new();
    let mut pos = start;
    let mut resume = 0;
    let mut jumped = false;
    let mut jumps = 0;

    loop {
        let Some(&len) = data.get(pos) else {
            return Err(RelayError::infra("truncated name"));
        };

        if len == 0 {
            pos += 1;
            break;
        }

        if len & 0xC0 == 0xC0 {
            let Some(&low) = data.get(pos + 1) else {
                return Err(RelayError::infra("truncated compression pointer"));
            };
            if !jumped {
                resume = pos + 2;
                jumped = true;
            }
            jumps += 1;
            if jumps > MAX_POINTER_JUMPS {
                return Err(RelayError::infra("compression pointer loop"));
            }
            pos = ((len as usize & 0x3F) << 8) | low as usize;
            continue;
        }

        if len & 0xC0 != 0 {
            return Err(RelayError::infra("reserved label type"));
        }

        let label_start = pos + 1;
        let label_end = label_start + len as usize;
        if label_end > data.len() {
            return Err(RelayError::infra("truncated label"));
        }
        let label = std::str::from_utf8(&data[label_start..label_end])
            .map_err(|_| RelayError::infra("label is not valid text"))?;

        if !name.is_empty() {
            name.push('.');
        }
        name.push_str(label);
        if name.len() > MAX_NAME_LEN {
            return Err(RelayError::infra("name too long"));
        }

        pos = label_end;
    }

    let next = if jumped { resume } else { pos };
    Ok((name, next))
}

fn encode_name(buf: &mut Vec<u8>, name: &str) -> Result<(), RelayError> {
    if name.is_empty() {
        // Root: just the terminating zero length.
        buf.push(0);
        return Ok(());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(RelayError::infra("name too long"));
    }

    for label in name.split('.') {
        if label.is_empty() {
            return Err(RelayError::infra("empty label"));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(RelayError::infra("label too long"));
        }
        buf.push(label.len() as u8);
        buf.extend_from_slice(label.as_bytes());
    }
    buf.push(0);

    Ok(())
}
