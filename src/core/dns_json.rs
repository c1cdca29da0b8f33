// JSON views of DNS records for binding payloads and CLI output.
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value, json};
use simple_dns::rdata::{RData, SVCB, TXT};
use simple_dns::{CLASS, Name, Packet, ResourceRecord};
use std::net::{Ipv4Addr, Ipv6Addr};

pub fn rdata_to_json(rdata: &RData<'_>) -> Value {
    match rdata {
        RData::A(a) => json!({
            "type": "A",
            "address": Ipv4Addr::from(a.address).to_string(),
        }),
        RData::AAAA(aaaa) => json!({
            "type": "AAAA",
            "address": Ipv6Addr::from(aaaa.address).to_string(),
        }),
        RData::AFSDB(afsdb) => json!({
            "type": "AFSDB",
            "subtype": afsdb.subtype,
            "hostname": afsdb.hostname.to_string(),
        }),
        RData::CAA(caa) => json!({
            "type": "CAA",
            "flag": caa.flag,
            "tag": caa.tag.to_string(),
            "value": STANDARD.encode(&caa.value),
        }),
        RData::CNAME(cname) => json!({
            "type": "CNAME",
            "cname": cname.0.to_string(),
        }),
        RData::HINFO(hinfo) => json!({
            "type": "HINFO",
            "cpu": hinfo.cpu.to_string(),
            "os": hinfo.os.to_string(),
        }),
        RData::HTTPS(https) => service_binding_json("HTTPS", &https.0),
        RData::MX(mx) => json!({
            "type": "MX",
            "preference": mx.preference,
            "exchange": mx.exchange.to_string(),
        }),
        RData::NAPTR(naptr) => json!({
            "type": "NAPTR",
            "order": naptr.order,
            "preference": naptr.preference,
            "flags": naptr.flags.to_string(),
            "services": naptr.services.to_string(),
            "regexp": naptr.regexp.to_string(),
            "replacement": naptr.replacement.to_string(),
        }),
        RData::NS(ns) => json!({
            "type": "NS",
            "nsdname": ns.0.to_string(),
        }),
        RData::NULL(_, null) => json!({
            "type": "NULL",
            "data": STANDARD.encode(null.get_data()),
        }),
        RData::OPT(opt) => json!({
            "type": "OPT",
            "version": opt.version,
            "opt_codes": opt
                .opt_codes
                .iter()
                .map(|code| json!({"code": code.code, "data": STANDARD.encode(&code.data)}))
                .collect::<Vec<_>>(),
        }),
        RData::PTR(ptr) => json!({
            "type": "PTR",
            "ptrdname": ptr.0.to_string(),
        }),
        RData::SOA(soa) => json!({
            "type": "SOA",
            "mname": soa.mname.to_string(),
            "rname": soa.rname.to_string(),
            "serial": soa.serial,
            "refresh": soa.refresh,
            "retry": soa.retry,
            "expire": soa.expire,
            "minimum": soa.minimum,
        }),
        RData::SRV(srv) => json!({
            "type": "SRV",
            "priority": srv.priority,
            "weight": srv.weight,
            "port": srv.port,
            "target": srv.target.to_string(),
        }),
        RData::SVCB(svcb) => service_binding_json("SVCB", svcb),
        RData::TXT(txt) => json!({"type": "TXT", "txt_data": txt_strings(txt)}),
        RData::WKS(wks) => json!({
            "type": "WKS",
            "address": Ipv4Addr::from(wks.address).to_string(),
            "protocol": wks.protocol,
            "bit_map": STANDARD.encode(&wks.bit_map),
        }),
        _ => json!({"type": "UNKNOWN"}),
    }
}

const DNS_HEADER_LEN: usize = 12;
// type(2) + class(2) + ttl(4) + rdlength(2)
const RR_FIXED_LEN: usize = 10;

/// Character strings of `txt` in the order they were published.
///
/// simple-dns only exposes TXT content as a `HashMap`, so the record is written
/// into a one-answer packet and its rdata walked directly.
fn txt_strings(txt: &TXT<'_>) -> Vec<String> {
    let mut packet = Packet::new_reply(0);
    packet.answers.push(ResourceRecord::new(
        Name::new_unchecked(""),
        CLASS::IN,
        0,
        RData::TXT(txt.clone()),
    ));
    let Ok(bytes) = packet.build_bytes_vec() else {
        return Vec::new();
    };

    let mut position = DNS_HEADER_LEN;
    while let Some(&label) = bytes.get(position) {
        position += usize::from(label) + 1;
        if label == 0 {
            break;
        }
    }
    position += RR_FIXED_LEN;

    let mut strings = Vec::new();
    while let Some(&length) = bytes.get(position) {
        let start = position + 1;
        let end = start + usize::from(length);
        let Some(data) = bytes.get(start..end) else {
            break;
        };
        strings.push(String::from_utf8_lossy(data).into_owned());
        position = end;
    }
    strings
}

fn service_binding_json(kind: &str, svcb: &SVCB<'_>) -> Value {
    let params: Map<String, Value> = svcb
        .iter_params()
        .map(|(key, value)| (key.to_string(), Value::String(STANDARD.encode(value))))
        .collect();
    json!({
        "type": kind,
        "priority": svcb.priority,
        "target": svcb.target.to_string(),
        "params": params,
    })
}

pub fn resource_record_to_json(record: &ResourceRecord<'_>) -> Value {
    json!({
        "name": record.name.to_string(),
        "ttl": record.ttl,
        "rdata": rdata_to_json(&record.rdata),
    })
}

/// Flattened HTTPS record view: port and ALPN ids decoded from the
/// service parameters. Returns `None` for other record types.
pub fn https_record_json(record: &ResourceRecord<'_>) -> Option<Value> {
    let RData::HTTPS(https) = &record.rdata else {
        return None;
    };
    let svcb = &https.0;
    let mut out = json!({
        "name": record.name.to_string(),
        "class": format!("{:?}", record.class),
        "ttl": record.ttl,
        "priority": svcb.priority,
        "target": svcb.target.to_string(),
    });
    if let Some(&[high, low]) = svcb.get_param(SVCB::PORT) {
        out["port"] = json!(u16::from_be_bytes([high, low]));
    }
    if let Some(alpn) = svcb.get_param(SVCB::ALPN) {
        out["alpn"] = json!(decode_alpn(alpn));
    }
    Some(out)
}

// Length-prefixed ids; stops at the first truncated entry.
fn decode_alpn(raw: &[u8]) -> Vec<String> {
    let mut ids = Vec::new();
    let mut position = 0;
    while position < raw.len() {
        let length = usize::from(raw[position]);
        position += 1;
        if position + length > raw.len() {
            break;
        }
        ids.push(String::from_utf8_lossy(&raw[position..position + length]).into_owned());
        position += length;
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::{decode_alpn, https_record_json, rdata_to_json, resource_record_to_json};
    use crate::core::keys::Keypair;
    use crate::core::signed_packet::SignedPacket;
    use simple_dns::rdata::{A, RData, TXT};

    #[test]
    fn address_records_render_as_text() {
        let value = rdata_to_json(&RData::A(A {
            address: u32::from(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        }));
        assert_eq!(value["type"], "A");
        assert_eq!(value["address"], "127.0.0.1");
    }

    #[test]
    fn records_from_a_signed_packet() {
        let keypair = Keypair::from_secret_key(&[4u8; 32]);
        let packet = SignedPacket::builder(&keypair)
            .txt("_foo", "hello=world", 30)
            .https("@", "example.com", 3600, Some(8443), &["h2", "h3"])
            .sign()
            .expect("sign");

        let txt = packet.resource_records("_foo");
        let value = resource_record_to_json(&txt[0]);
        assert_eq!(value["name"], format!("_foo.{}", keypair.public_key()));
        assert_eq!(value["ttl"], 30);
        assert_eq!(value["rdata"]["type"], "TXT");
        assert_eq!(value["rdata"]["txt_data"][0], "hello=world");

        let https = packet.resource_records("@");
        let value = https_record_json(&https[0]).expect("https");
        assert_eq!(value["class"], "IN");
        assert_eq!(value["priority"], 0);
        assert_eq!(value["target"], "example.com");
        assert_eq!(value["port"], 8443);
        assert_eq!(value["alpn"], serde_json::json!(["h2", "h3"]));

        assert!(https_record_json(&txt[0]).is_none());
        let generic = rdata_to_json(&https[0].rdata);
        assert_eq!(generic["params"]["3"], "IPs=");
    }

    #[test]
    fn txt_strings_keep_record_order() {
        let txt = TXT::new()
            .with_string("zeta=1")
            .and_then(|txt| txt.with_string("alpha=2"))
            .and_then(|txt| txt.with_string("flag"))
            .and_then(|txt| txt.with_string("alpha=3"))
            .expect("txt");
        let value = rdata_to_json(&RData::TXT(txt));
        assert_eq!(
            value["txt_data"],
            serde_json::json!(["zeta=1", "alpha=2", "flag", "alpha=3"])
        );
    }

    #[test]
    fn truncated_alpn_stops_early() {
        assert_eq!(decode_alpn(&[2, b'h', b'2', 5, b'x']), vec!["h2".to_string()]);
        assert!(decode_alpn(&[]).is_empty());
    }
}
