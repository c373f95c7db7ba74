/**
 * SNMP GET - Interrogation point par point des imprimantes
 *
 * RÔLE : Un GET v2c minimal sur UDP/161, PDU encodés BER à la main
 * (le sous-ensemble utile : INTEGER, OCTET STRING, OID, NULL, compteurs).
 * Chaque requête est bornée par le timeout des réglages et réessayée.
 *
 * ARCHITECTURE : Le trait DeviceQuery est la couture testable ; SnmpClient
 * est l'implémentation production, le devkit fournit un stub scripté.
 */
use async_trait::async_trait;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;

/// Valeur renvoyée par un point de donnée.
#[derive(Debug, Clone, PartialEq)]
pub enum SnmpValue {
    Integer(i64),
    OctetString(String),
    Null,
}

impl SnmpValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SnmpValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SnmpValue::OctetString(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DeviceError {
    #[error("request timed out")]
    Timeout,
    #[error("device unreachable: {0}")]
    Unreachable(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Un point query contre un appareil. C'est la seule opération suspensive
/// du scan ; toute erreur reste confinée à l'imprimante concernée.
#[async_trait]
pub trait DeviceQuery: Send + Sync {
    async fn get(
        &self,
        ip: &str,
        community: &str,
        oid: &str,
        timeout: Duration,
    ) -> Result<SnmpValue, DeviceError>;
}

/// Client SNMP v2c production. Un socket éphémère par requête, pas de pool :
/// le parallélisme est déjà borné au niveau du cycle de scan.
pub struct SnmpClient {
    port: u16,
    retries: u8,
    request_id: AtomicI32,
}

impl SnmpClient {
    pub fn new(port: u16, retries: u8) -> Self {
        Self {
            port,
            retries,
            request_id: AtomicI32::new(1),
        }
    }

    async fn exchange(
        &self,
        ip: &str,
        packet: &[u8],
        request_id: i32,
    ) -> Result<SnmpValue, DeviceError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| DeviceError::Unreachable(e.to_string()))?;
        socket
            .connect((ip, self.port))
            .await
            .map_err(|e| DeviceError::Unreachable(e.to_string()))?;
        socket
            .send(packet)
            .await
            .map_err(|e| DeviceError::Unreachable(e.to_string()))?;

        let mut buf = [0u8; 1500];
        let n = socket
            .recv(&mut buf)
            .await
            .map_err(|e| DeviceError::Unreachable(e.to_string()))?;
        parse_response(&buf[..n], request_id)
    }
}

#[async_trait]
impl DeviceQuery for SnmpClient {
    async fn get(
        &self,
        ip: &str,
        community: &str,
        oid: &str,
        timeout: Duration,
    ) -> Result<SnmpValue, DeviceError> {
        let request_id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let packet = build_get_request(community, oid, request_id)?;

        let mut last = DeviceError::Timeout;
        for _attempt in 0..=self.retries {
            match tokio::time::timeout(timeout, self.exchange(ip, &packet, request_id)).await {
                Ok(Ok(value)) => return Ok(value),
                // bind/connect cassé : réessayer ne changera rien
                Ok(Err(e @ DeviceError::Unreachable(_))) => return Err(e),
                Ok(Err(e)) => last = e,
                Err(_) => last = DeviceError::Timeout,
            }
        }
        Err(last)
    }
}

// ---- Encodage BER ----

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_GET_REQUEST: u8 = 0xA0;
const TAG_GET_RESPONSE: u8 = 0xA2;

fn push_len(buf: &mut Vec<u8>, len: usize) {
    if len < 128 {
        buf.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let first = bytes.iter().position(|&b| b != 0).unwrap_or(7);
        buf.push(0x80 | (8 - first) as u8);
        buf.extend_from_slice(&bytes[first..]);
    }
}

fn push_tlv(buf: &mut Vec<u8>, tag: u8, content: &[u8]) {
    buf.push(tag);
    push_len(buf, content.len());
    buf.extend_from_slice(content);
}

/// Complément à deux minimal, big-endian.
fn encode_integer(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let cur = bytes[start];
        let next = bytes[start + 1];
        let redundant =
            (cur == 0x00 && next & 0x80 == 0) || (cur == 0xFF && next & 0x80 != 0);
        if redundant {
            start += 1;
        } else {
            break;
        }
    }
    bytes[start..].to_vec()
}

/// "1.3.6.1.2.1.1.1.0" -> octets X.690 (deux premiers arcs combinés, base 128 ensuite).
fn encode_oid(oid: &str) -> Result<Vec<u8>, DeviceError> {
    let arcs: Vec<u64> = oid
        .split('.')
        .map(|s| s.parse::<u64>())
        .collect::<Result<_, _>>()
        .map_err(|_| DeviceError::Protocol(format!("invalid oid: {oid}")))?;
    if arcs.len() < 2 || arcs[0] > 2 || arcs[1] > 39 {
        return Err(DeviceError::Protocol(format!("invalid oid: {oid}")));
    }

    let mut out = vec![(arcs[0] * 40 + arcs[1]) as u8];
    for &arc in &arcs[2..] {
        let mut tmp = [0u8; 10];
        let mut i = 9;
        tmp[i] = (arc & 0x7F) as u8;
        let mut rest = arc >> 7;
        while rest > 0 {
            i -= 1;
            tmp[i] = 0x80 | (rest & 0x7F) as u8;
            rest >>= 7;
        }
        out.extend_from_slice(&tmp[i..]);
    }
    Ok(out)
}

fn build_pdu(pdu_tag: u8, community: &str, request_id: i32, varbind: &[u8]) -> Vec<u8> {
    let mut varbind_list = Vec::new();
    push_tlv(&mut varbind_list, TAG_SEQUENCE, varbind);

    let mut pdu = Vec::new();
    push_tlv(&mut pdu, TAG_INTEGER, &encode_integer(request_id as i64));
    push_tlv(&mut pdu, TAG_INTEGER, &encode_integer(0)); // error-status
    push_tlv(&mut pdu, TAG_INTEGER, &encode_integer(0)); // error-index
    push_tlv(&mut pdu, TAG_SEQUENCE, &varbind_list);

    let mut msg = Vec::new();
    push_tlv(&mut msg, TAG_INTEGER, &encode_integer(1)); // version v2c
    push_tlv(&mut msg, TAG_OCTET_STRING, community.as_bytes());
    push_tlv(&mut msg, pdu_tag, &pdu);

    let mut out = Vec::new();
    push_tlv(&mut out, TAG_SEQUENCE, &msg);
    out
}

fn build_get_request(community: &str, oid: &str, request_id: i32) -> Result<Vec<u8>, DeviceError> {
    let oid_bytes = encode_oid(oid)?;
    let mut varbind = Vec::new();
    push_tlv(&mut varbind, TAG_OID, &oid_bytes);
    varbind.push(TAG_NULL);
    varbind.push(0x00);
    Ok(build_pdu(TAG_GET_REQUEST, community, request_id, &varbind))
}

// ---- Décodage BER ----

struct Ber<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Ber<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_tlv(&mut self) -> Result<(u8, &'a [u8]), DeviceError> {
        let truncated = || DeviceError::Protocol("truncated response".into());
        let tag = *self.data.get(self.pos).ok_or_else(truncated)?;
        self.pos += 1;

        let first = *self.data.get(self.pos).ok_or_else(truncated)?;
        self.pos += 1;
        let len = if first & 0x80 == 0 {
            first as usize
        } else {
            let n = (first & 0x7F) as usize;
            if n == 0 || n > 4 {
                return Err(DeviceError::Protocol("unsupported length form".into()));
            }
            let mut len = 0usize;
            for _ in 0..n {
                let b = *self.data.get(self.pos).ok_or_else(truncated)?;
                self.pos += 1;
                len = (len << 8) | b as usize;
            }
            len
        };

        let end = self.pos.checked_add(len).ok_or_else(truncated)?;
        if end > self.data.len() {
            return Err(truncated());
        }
        let content = &self.data[self.pos..end];
        self.pos = end;
        Ok((tag, content))
    }

    fn expect(&mut self, expected: u8) -> Result<&'a [u8], DeviceError> {
        let (tag, content) = self.read_tlv()?;
        if tag != expected {
            return Err(DeviceError::Protocol(format!(
                "expected tag 0x{expected:02x}, got 0x{tag:02x}"
            )));
        }
        Ok(content)
    }

    fn expect_integer(&mut self) -> Result<i64, DeviceError> {
        let content = self.expect(TAG_INTEGER)?;
        decode_integer(content, true)
    }
}

fn decode_integer(content: &[u8], signed: bool) -> Result<i64, DeviceError> {
    if content.is_empty() || content.len() > 8 {
        return Err(DeviceError::Protocol("bad integer length".into()));
    }
    let mut value: i64 = if signed && content[0] & 0x80 != 0 { -1 } else { 0 };
    for &b in content {
        value = (value << 8) | b as i64;
    }
    Ok(value)
}

fn parse_response(buf: &[u8], expected_request_id: i32) -> Result<SnmpValue, DeviceError> {
    let mut outer = Ber::new(buf);
    let msg = outer.expect(TAG_SEQUENCE)?;

    let mut msg = Ber::new(msg);
    let _version = msg.expect_integer()?;
    let _community = msg.expect(TAG_OCTET_STRING)?;
    let pdu = msg.expect(TAG_GET_RESPONSE)?;

    let mut pdu = Ber::new(pdu);
    let request_id = pdu.expect_integer()?;
    if request_id != expected_request_id as i64 {
        return Err(DeviceError::Protocol("request id mismatch".into()));
    }
    let error_status = pdu.expect_integer()?;
    let _error_index = pdu.expect_integer()?;
    if error_status != 0 {
        return Err(DeviceError::Protocol(format!(
            "agent returned error-status {error_status}"
        )));
    }

    let varbind_list = pdu.expect(TAG_SEQUENCE)?;
    let mut varbind_list = Ber::new(varbind_list);
    let varbind = varbind_list.expect(TAG_SEQUENCE)?;
    let mut varbind = Ber::new(varbind);
    let _oid = varbind.expect(TAG_OID)?;

    let (tag, content) = varbind.read_tlv()?;
    match tag {
        TAG_INTEGER => Ok(SnmpValue::Integer(decode_integer(content, true)?)),
        // Counter32 / Gauge32 / TimeTicks / Counter64 : non signés
        0x41 | 0x42 | 0x43 | 0x46 => Ok(SnmpValue::Integer(decode_integer(content, false)?)),
        TAG_OCTET_STRING => Ok(SnmpValue::OctetString(
            String::from_utf8_lossy(content).to_string(),
        )),
        TAG_NULL => Ok(SnmpValue::Null),
        // noSuchObject / noSuchInstance / endOfMibView
        0x80 | 0x81 | 0x82 => Err(DeviceError::Protocol("no such object".into())),
        other => Err(DeviceError::Protocol(format!(
            "unsupported value tag 0x{other:02x}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_get_response(community: &str, oid: &str, request_id: i32, value: &SnmpValue) -> Vec<u8> {
        let mut varbind = Vec::new();
        push_tlv(&mut varbind, TAG_OID, &encode_oid(oid).unwrap());
        match value {
            SnmpValue::Integer(v) => push_tlv(&mut varbind, TAG_INTEGER, &encode_integer(*v)),
            SnmpValue::OctetString(s) => push_tlv(&mut varbind, TAG_OCTET_STRING, s.as_bytes()),
            SnmpValue::Null => push_tlv(&mut varbind, TAG_NULL, &[]),
        }
        build_pdu(TAG_GET_RESPONSE, community, request_id, &varbind)
    }

    fn parse_request_id(buf: &[u8]) -> i64 {
        let mut outer = Ber::new(buf);
        let msg = outer.expect(TAG_SEQUENCE).unwrap();
        let mut msg = Ber::new(msg);
        msg.expect_integer().unwrap();
        msg.expect(TAG_OCTET_STRING).unwrap();
        let pdu = msg.expect(TAG_GET_REQUEST).unwrap();
        let mut pdu = Ber::new(pdu);
        pdu.expect_integer().unwrap()
    }

    #[test]
    fn test_encode_oid() {
        assert_eq!(
            encode_oid("1.3.6.1.2.1.1.1.0").unwrap(),
            vec![0x2B, 0x06, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00]
        );
        // arc > 127 -> base 128 avec bit de continuation (1.3.6.1.4.1.2435 = Brother)
        assert_eq!(
            encode_oid("1.3.6.1.4.1.2435").unwrap(),
            vec![0x2B, 0x06, 0x01, 0x04, 0x01, 0x93, 0x03]
        );
        assert!(encode_oid("not.an.oid").is_err());
    }

    #[test]
    fn test_encode_integer_minimal_form() {
        assert_eq!(encode_integer(0), vec![0x00]);
        assert_eq!(encode_integer(127), vec![0x7F]);
        assert_eq!(encode_integer(128), vec![0x00, 0x80]);
        assert_eq!(encode_integer(-1), vec![0xFF]);
        assert_eq!(decode_integer(&encode_integer(90210), true).unwrap(), 90210);
        assert_eq!(decode_integer(&encode_integer(-42), true).unwrap(), -42);
    }

    #[test]
    fn test_response_roundtrip() {
        let oid = "1.3.6.1.2.1.43.10.2.1.4.1.1";
        let buf = build_get_response("public", oid, 7, &SnmpValue::Integer(85));
        assert_eq!(parse_response(&buf, 7).unwrap(), SnmpValue::Integer(85));

        let buf = build_get_response("public", oid, 7, &SnmpValue::OctetString("HP LaserJet".into()));
        assert_eq!(
            parse_response(&buf, 7).unwrap(),
            SnmpValue::OctetString("HP LaserJet".into())
        );
    }

    #[test]
    fn test_response_request_id_mismatch() {
        let buf = build_get_response("public", "1.3.6.1.2.1.1.1.0", 7, &SnmpValue::Integer(1));
        assert!(matches!(
            parse_response(&buf, 8),
            Err(DeviceError::Protocol(_))
        ));
    }

    #[test]
    fn test_truncated_response_rejected() {
        let buf = build_get_response("public", "1.3.6.1.2.1.1.1.0", 7, &SnmpValue::Integer(1));
        assert!(parse_response(&buf[..buf.len() - 3], 7).is_err());
    }

    #[tokio::test]
    async fn test_get_against_loopback_agent() {
        // Faux agent : renvoie 42 à toute requête, avec le bon request id
        let responder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = responder.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buf = [0u8; 1500];
            let (n, peer) = responder.recv_from(&mut buf).await.unwrap();
            let request_id = parse_request_id(&buf[..n]) as i32;
            let reply =
                build_get_response("public", "1.3.6.1.2.1.1.1.0", request_id, &SnmpValue::Integer(42));
            responder.send_to(&reply, peer).await.unwrap();
        });

        let client = SnmpClient::new(port, 0);
        let value = client
            .get("127.0.0.1", "public", "1.3.6.1.2.1.1.1.0", Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(value, SnmpValue::Integer(42));
    }

    #[tokio::test]
    async fn test_get_times_out_without_agent() {
        // Port fermé en UDP : pas de réponse, le timeout doit tomber
        let client = SnmpClient::new(39999, 0);
        let err = client
            .get("127.0.0.1", "public", "1.3.6.1.2.1.1.1.0", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::Timeout | DeviceError::Unreachable(_)));
    }
}
