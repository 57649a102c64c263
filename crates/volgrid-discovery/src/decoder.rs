//! Status message decoder.
//!
//! Turns one datagram payload into a [`StatusRecord`]. Anything that is
//! not a well-formed module or disk-array status message decodes to
//! [`StatusPayload::Unknown`]; decoding never fails.

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::trace;

use crate::record::{NO_VOLUME, StatusPayload, StatusRecord};
use crate::wire::{ARRAY_STATUS_TAG, BANK_A_TAG, BANK_B_TAG, FROM_TAG, MODULE_STATUS_TAG, STATE_TAG};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Module,
    DiskArray,
}

/// Fields collected while walking one message.
#[derive(Debug, Default)]
struct Collected {
    shape: Option<Shape>,
    unit: Option<String>,
    state: Option<String>,
    bank_a: Option<String>,
    bank_b: Option<String>,
    fields: BTreeMap<String, String>,
}

impl Collected {
    fn leaf(&mut self, name: &str, value: String, in_status: bool) {
        if name == FROM_TAG && self.unit.is_none() {
            self.unit = Some(value.to_lowercase());
            return;
        }
        if !in_status {
            return;
        }
        if name == STATE_TAG {
            self.state = Some(value.clone());
        }
        match self.shape {
            Some(Shape::Module) if name == BANK_A_TAG => self.bank_a = Some(normalize_serial(&value)),
            Some(Shape::Module) if name == BANK_B_TAG => self.bank_b = Some(normalize_serial(&value)),
            Some(Shape::DiskArray) => {
                self.fields.insert(name.to_string(), value);
            }
            _ => {}
        }
    }

    fn into_record(self, origin_host: &str) -> StatusRecord {
        let payload = match self.shape {
            Some(Shape::Module) => StatusPayload::Module {
                bank_a: self.bank_a.unwrap_or_else(|| NO_VOLUME.to_string()),
                bank_b: self.bank_b.unwrap_or_else(|| NO_VOLUME.to_string()),
            },
            Some(Shape::DiskArray) => StatusPayload::DiskArray {
                slot_fields: self.fields,
            },
            None => return StatusRecord::unknown(origin_host),
        };
        StatusRecord {
            origin_host: origin_host.to_string(),
            unit: self.unit.unwrap_or_default(),
            state: self.state.unwrap_or_else(|| "Unknown".to_string()),
            payload,
        }
    }
}

/// Accept a bank serial only if it is exactly eight characters; store it upper-cased.
fn normalize_serial(raw: &str) -> String {
    if raw.chars().count() == 8 {
        raw.to_uppercase()
    } else {
        NO_VOLUME.to_string()
    }
}

/// Decode a status payload received from `origin_host`.
pub fn decode(origin_host: &str, payload: &[u8]) -> StatusRecord {
    let Ok(text) = std::str::from_utf8(payload) else {
        trace!(host = origin_host, "payload is not UTF-8");
        return StatusRecord::unknown(origin_host);
    };
    match walk(text) {
        Ok(collected) => collected.into_record(origin_host),
        Err(reason) => {
            trace!(host = origin_host, %reason, "undecodable payload");
            StatusRecord::unknown(origin_host)
        }
    }
}

fn walk(text: &str) -> Result<Collected, String> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut collected = Collected::default();
    // Open elements: (name, has child elements).
    let mut open: Vec<(String, bool)> = Vec::new();
    // Depth of the status element while it is open.
    let mut status_depth: Option<usize> = None;
    let mut text_buf = String::new();

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if let Some(parent) = open.last_mut() {
                    parent.1 = true;
                }
                if collected.shape.is_none() {
                    let shape = match name.as_str() {
                        MODULE_STATUS_TAG => Some(Shape::Module),
                        ARRAY_STATUS_TAG => Some(Shape::DiskArray),
                        _ => None,
                    };
                    if shape.is_some() {
                        collected.shape = shape;
                        status_depth = Some(open.len());
                    }
                }
                open.push((name, false));
                text_buf.clear();
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if let Some(parent) = open.last_mut() {
                    parent.1 = true;
                }
                let in_status = status_depth.is_some_and(|d| open.len() > d);
                collected.leaf(&name, String::new(), in_status);
            }
            Event::Text(t) => {
                text_buf = t.unescape().map_err(|e| e.to_string())?.into_owned();
            }
            Event::CData(c) => {
                text_buf = String::from_utf8_lossy(&c).into_owned();
            }
            Event::End(_) => {
                let Some((name, has_children)) = open.pop() else {
                    return Err("unbalanced end tag".to_string());
                };
                let value = std::mem::take(&mut text_buf);
                if status_depth == Some(open.len()) {
                    status_depth = None;
                    continue;
                }
                if !has_children {
                    let in_status = status_depth.is_some_and(|d| open.len() > d);
                    collected.leaf(&name, value, in_status);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !open.is_empty() {
        return Err("truncated message".to_string());
    }
    Ok(collected)
}
