//! Parse and emit of firewalld `<service>` documents.
//!
//! The on-disk format is an XML document rooted at `<service>` with an
//! optional `version` attribute, optional `<short>` and `<description>`
//! text children, and repeated `<port>`, `<protocol>`, `<source-port>`,
//! and `<module>` elements plus at most one `<destination>`. Output is
//! UTF-8 with two-space indentation. When both destinations equal the
//! family wildcards the `<destination>` element is omitted, which keeps
//! wildcard-only services byte-identical to stock system files.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::warn;

use crate::error::FwsetError;
use crate::port::PortRange;
use crate::prefix::{Prefix, UNSPECIFIED_IPV4, UNSPECIFIED_IPV6};
use crate::protocol::Protocol;
use crate::service::Service;

/// Which text-bearing child element is currently open.
enum TextField {
    Short,
    Description,
}

/// Parses a service document.
///
/// The service name is not part of the document; callers pass the file
/// stem. Unknown child elements are ignored, matching the daemon's own
/// tolerance. A missing `<destination>` element expands to both family
/// wildcards.
pub fn parse_service(name: &str, xml: &[u8]) -> Result<Service, FwsetError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut saw_root = false;
    let mut version: Option<String> = None;
    let mut short_name: Option<String> = None;
    let mut description: Option<String> = None;
    let mut ports: Vec<PortRange> = Vec::new();
    let mut protocols: Vec<Protocol> = Vec::new();
    let mut source_ports: Vec<PortRange> = Vec::new();
    let mut modules: Vec<String> = Vec::new();
    let mut destination_ipv4: Option<Prefix> = None;
    let mut destination_ipv6: Option<Prefix> = None;
    let mut saw_destination = false;
    let mut text_field: Option<TextField> = None;

    let mut buf = Vec::new();
    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|err| FwsetError::InvalidFormat(err.to_string()))?;
        let is_start = matches!(event, Event::Start(_));
        match event {
            Event::Start(e) | Event::Empty(e) if !saw_root => {
                if e.name().as_ref() != b"service" {
                    return Err(FwsetError::InvalidFormat(format!(
                        "root node is not a service: {}",
                        String::from_utf8_lossy(e.name().as_ref())
                    )));
                }
                version = attr_value(&e, b"version")?;
                saw_root = true;
            }
            Event::Start(e) | Event::Empty(e) => {
                match e.name().as_ref() {
                    b"short" if is_start => text_field = Some(TextField::Short),
                    b"description" if is_start => text_field = Some(TextField::Description),
                    b"short" | b"description" => {}
                    b"port" => {
                        let protocol = required_protocol(&e)?;
                        match attr_value(&e, b"port")? {
                            // A <port> without a port attribute opens the whole protocol.
                            None => push_unique(&mut protocols, protocol, "protocol")?,
                            Some(port) => push_unique(
                                &mut ports,
                                PortRange::parse(&port, protocol)
                                    .map_err(|err| FwsetError::InvalidFormat(err.to_string()))?,
                                "port",
                            )?,
                        }
                    }
                    b"protocol" => {
                        let value = attr_value(&e, b"value")?.ok_or_else(|| {
                            FwsetError::InvalidFormat("protocol without value".to_string())
                        })?;
                        let protocol = value
                            .parse::<Protocol>()
                            .map_err(|err| FwsetError::InvalidFormat(err.to_string()))?;
                        push_unique(&mut protocols, protocol, "protocol")?;
                    }
                    b"source-port" => {
                        let protocol = required_protocol(&e)?;
                        let port = attr_value(&e, b"port")?.ok_or_else(|| {
                            FwsetError::InvalidFormat("source-port without port".to_string())
                        })?;
                        push_unique(
                            &mut source_ports,
                            PortRange::parse(&port, protocol)
                                .map_err(|err| FwsetError::InvalidFormat(err.to_string()))?,
                            "source-port",
                        )?;
                    }
                    b"module" => {
                        let module = attr_value(&e, b"name")?.ok_or_else(|| {
                            FwsetError::InvalidFormat("module without name".to_string())
                        })?;
                        push_unique(&mut modules, module, "module")?;
                    }
                    b"destination" => {
                        destination_ipv4 = parse_destination_attr(&e, b"ipv4")?;
                        destination_ipv6 = parse_destination_attr(&e, b"ipv6")?;
                        if destination_ipv4.is_none() && destination_ipv6.is_none() {
                            return Err(FwsetError::InvalidFormat(
                                "destination has neither ipv4 nor ipv6".to_string(),
                            ));
                        }
                        saw_destination = true;
                    }
                    other => {
                        warn!(
                            service = name,
                            element = %String::from_utf8_lossy(other),
                            "ignoring unknown service element"
                        );
                    }
                }
            }
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|err| FwsetError::InvalidFormat(err.to_string()))?
                    .into_owned();
                match text_field {
                    Some(TextField::Short) => short_name = Some(text),
                    Some(TextField::Description) => description = Some(text),
                    None => {}
                }
            }
            Event::End(_) => text_field = None,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(FwsetError::InvalidFormat("no service element".to_string()));
    }
    if !saw_destination {
        destination_ipv4 = Some(UNSPECIFIED_IPV4);
        destination_ipv6 = Some(UNSPECIFIED_IPV6);
    }
    Service::new(
        name,
        version,
        short_name,
        description,
        ports,
        protocols,
        source_ports,
        modules,
        destination_ipv4,
        destination_ipv6,
    )
    .map_err(|err| FwsetError::InvalidFormat(err.to_string()))
}

/// Serializes a service back into document form.
pub fn emit_service(service: &Service) -> Result<Vec<u8>, FwsetError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_service(&mut writer, service)
        .map_err(|err| FwsetError::InvalidFormat(err.to_string()))?;
    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

fn write_service(
    writer: &mut Writer<Vec<u8>>,
    service: &Service,
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut root = BytesStart::new("service");
    if let Some(version) = service.version() {
        root.push_attribute(("version", version));
    }
    writer.write_event(Event::Start(root))?;

    if let Some(short) = service.short_name() {
        writer.write_event(Event::Start(BytesStart::new("short")))?;
        writer.write_event(Event::Text(BytesText::new(short)))?;
        writer.write_event(Event::End(BytesEnd::new("short")))?;
    }
    if let Some(description) = service.description() {
        writer.write_event(Event::Start(BytesStart::new("description")))?;
        writer.write_event(Event::Text(BytesText::new(description)))?;
        writer.write_event(Event::End(BytesEnd::new("description")))?;
    }
    for port in service.ports() {
        let mut elem = BytesStart::new("port");
        elem.push_attribute(("protocol", port.protocol().keyword()));
        elem.push_attribute(("port", port.port_attr().as_str()));
        writer.write_event(Event::Empty(elem))?;
    }
    for protocol in service.protocols() {
        let mut elem = BytesStart::new("protocol");
        elem.push_attribute(("value", protocol.keyword()));
        writer.write_event(Event::Empty(elem))?;
    }
    for source_port in service.source_ports() {
        let mut elem = BytesStart::new("source-port");
        elem.push_attribute(("protocol", source_port.protocol().keyword()));
        elem.push_attribute(("port", source_port.port_attr().as_str()));
        writer.write_event(Event::Empty(elem))?;
    }
    for module in service.modules() {
        let mut elem = BytesStart::new("module");
        elem.push_attribute(("name", module.as_str()));
        writer.write_event(Event::Empty(elem))?;
    }
    let wildcard_only = service.destination_ipv4() == Some(UNSPECIFIED_IPV4)
        && service.destination_ipv6() == Some(UNSPECIFIED_IPV6);
    if !wildcard_only {
        let mut elem = BytesStart::new("destination");
        if let Some(v4) = service.destination_ipv4() {
            elem.push_attribute(("ipv4", v4.to_string().as_str()));
        }
        if let Some(v6) = service.destination_ipv6() {
            elem.push_attribute(("ipv6", v6.to_string().as_str()));
        }
        writer.write_event(Event::Empty(elem))?;
    }

    writer.write_event(Event::End(BytesEnd::new("service")))?;
    Ok(())
}

/// Reads one attribute, treating a missing or empty value as absent.
fn attr_value(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, FwsetError> {
    let attr = e
        .try_get_attribute(name)
        .map_err(|err| FwsetError::InvalidFormat(err.to_string()))?;
    match attr {
        None => Ok(None),
        Some(attr) => {
            let value = attr
                .unescape_value()
                .map_err(|err| FwsetError::InvalidFormat(err.to_string()))?
                .into_owned();
            Ok(if value.is_empty() { None } else { Some(value) })
        }
    }
}

fn required_protocol(e: &BytesStart<'_>) -> Result<Protocol, FwsetError> {
    let value = attr_value(e, b"protocol")?
        .ok_or_else(|| FwsetError::InvalidFormat("element without protocol".to_string()))?;
    value
        .parse::<Protocol>()
        .map_err(|err| FwsetError::InvalidFormat(err.to_string()))
}

fn parse_destination_attr(
    e: &BytesStart<'_>,
    name: &[u8],
) -> Result<Option<Prefix>, FwsetError> {
    attr_value(e, name)?
        .map(|value| {
            value
                .parse::<Prefix>()
                .map_err(|err| FwsetError::InvalidFormat(err.to_string()))
        })
        .transpose()
}

fn push_unique<T: PartialEq + std::fmt::Debug>(
    values: &mut Vec<T>,
    value: T,
    kind: &str,
) -> Result<(), FwsetError> {
    if values.contains(&value) {
        return Err(FwsetError::InvalidFormat(format!(
            "duplicate {kind}: {value:?}"
        )));
    }
    values.push(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefix::{UNSPECIFIED_IPV4, UNSPECIFIED_IPV6};

    const SSH_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<service>
  <short>SSH</short>
  <description>Secure Shell (SSH) is a protocol for logging into and executing commands on remote machines.</description>
  <port protocol="tcp" port="22"/>
</service>
"#;

    #[test]
    fn test_parse_ssh() {
        let service = parse_service("ssh", SSH_XML.as_bytes()).unwrap();
        assert_eq!(service.name(), "ssh");
        assert_eq!(service.short_name(), Some("SSH"));
        assert_eq!(
            service.ports(),
            &[PortRange::single(22, Protocol::Tcp).unwrap()]
        );
        assert!(service.protocols().is_empty());
        // No destination element expands to both wildcards.
        assert_eq!(service.destination_ipv4(), Some(UNSPECIFIED_IPV4));
        assert_eq!(service.destination_ipv6(), Some(UNSPECIFIED_IPV6));
    }

    #[test]
    fn test_parse_full_document() {
        let xml = r#"<service version="1.1">
  <short>Sample</short>
  <description>Sample service</description>
  <port protocol="tcp" port="22-25"/>
  <port protocol="udp" port="53"/>
  <protocol value="esp"/>
  <source-port protocol="tcp" port="1024-65535"/>
  <module name="nf_conntrack_ftp"/>
  <destination ipv4="192.0.2.0/24" ipv6="2001:db8::/32"/>
</service>"#;
        let service = parse_service("sample", xml.as_bytes()).unwrap();
        assert_eq!(service.version(), Some("1.1"));
        assert_eq!(service.ports().len(), 2);
        assert_eq!(service.protocols(), &[Protocol::Esp]);
        assert_eq!(service.source_ports().len(), 1);
        assert_eq!(service.modules(), &["nf_conntrack_ftp".to_string()]);
        assert_eq!(
            service.destination_ipv4(),
            Some("192.0.2.0/24".parse().unwrap())
        );
        assert_eq!(
            service.destination_ipv6(),
            Some("2001:db8::/32".parse().unwrap())
        );
    }

    #[test]
    fn test_parse_rejects_wrong_root() {
        let err = parse_service("x", b"<zone><port protocol=\"tcp\" port=\"1\"/></zone>");
        assert!(matches!(err, Err(FwsetError::InvalidFormat(_))));
    }

    #[test]
    fn test_parse_rejects_duplicate_port() {
        let xml = r#"<service>
  <port protocol="tcp" port="22"/>
  <port protocol="tcp" port="22"/>
</service>"#;
        let err = parse_service("dup", xml.as_bytes());
        assert!(matches!(err, Err(FwsetError::InvalidFormat(_))));
    }

    #[test]
    fn test_parse_rejects_unknown_protocol() {
        let xml = r#"<service><port protocol="quic" port="443"/></service>"#;
        assert!(parse_service("q", xml.as_bytes()).is_err());
    }

    #[test]
    fn test_parse_rejects_empty_destination() {
        let xml = r#"<service>
  <port protocol="tcp" port="22"/>
  <destination/>
</service>"#;
        assert!(parse_service("d", xml.as_bytes()).is_err());
    }

    #[test]
    fn test_parse_rejects_malformed_xml() {
        assert!(parse_service("bad", b"<service><port").is_err());
        assert!(parse_service("bad", b"not xml at all").is_err());
    }

    #[test]
    fn test_port_without_port_attr_is_bare_protocol() {
        let xml = r#"<service><port protocol="gre"/></service>"#;
        let service = parse_service("gre", xml.as_bytes()).unwrap();
        assert!(service.ports().is_empty());
        assert_eq!(service.protocols(), &[Protocol::Gre]);
    }

    #[test]
    fn test_empty_short_normalizes_to_absent() {
        let xml = r#"<service><short></short><port protocol="tcp" port="22"/></service>"#;
        let service = parse_service("s", xml.as_bytes()).unwrap();
        assert_eq!(service.short_name(), None);
    }

    #[test]
    fn test_emit_omits_wildcard_destination() {
        let service = Service::new(
            "ssh",
            None,
            None,
            None,
            vec![PortRange::single(22, Protocol::Tcp).unwrap()],
            vec![],
            vec![],
            vec![],
            Some(UNSPECIFIED_IPV4),
            Some(UNSPECIFIED_IPV6),
        )
        .unwrap();
        let xml = String::from_utf8(emit_service(&service).unwrap()).unwrap();
        assert!(!xml.contains("destination"));
        assert!(xml.contains(r#"<port protocol="tcp" port="22"/>"#));
    }

    #[test]
    fn test_emit_keeps_partial_destination() {
        let service = Service::new(
            "pinned",
            None,
            None,
            None,
            vec![PortRange::single(22, Protocol::Tcp).unwrap()],
            vec![],
            vec![],
            vec![],
            Some("1.2.3.4".parse().unwrap()),
            None,
        )
        .unwrap();
        let xml = String::from_utf8(emit_service(&service).unwrap()).unwrap();
        assert!(xml.contains(r#"<destination ipv4="1.2.3.4"/>"#));
    }

    #[test]
    fn test_round_trip_specific_destination() {
        let service = Service::new(
            "rt",
            Some("7".to_string()),
            Some("Round Trip".to_string()),
            Some("All fields".to_string()),
            vec![
                PortRange::new(22, 25, Protocol::Tcp).unwrap(),
                PortRange::single(53, Protocol::Udp).unwrap(),
            ],
            vec![Protocol::Esp],
            vec![PortRange::new(1024, 65535, Protocol::Tcp).unwrap()],
            vec!["nf_conntrack_sip".to_string()],
            Some("1.2.3.0/24".parse().unwrap()),
            Some("1:2:3:4:5:6:7:8".parse().unwrap()),
        )
        .unwrap();
        let bytes = emit_service(&service).unwrap();
        let loaded = parse_service("rt", &bytes).unwrap();
        assert_eq!(loaded, service);
    }

    #[test]
    fn test_round_trip_wildcards_restored() {
        let service = Service::new(
            "wild",
            None,
            None,
            None,
            vec![PortRange::single(22, Protocol::Tcp).unwrap()],
            vec![],
            vec![],
            vec![],
            Some(UNSPECIFIED_IPV4),
            Some(UNSPECIFIED_IPV6),
        )
        .unwrap();
        let loaded = parse_service("wild", &emit_service(&service).unwrap()).unwrap();
        assert_eq!(loaded, service);
    }

    #[test]
    fn test_emit_escapes_text() {
        let service = Service::new(
            "esc",
            None,
            Some("a & b <c>".to_string()),
            None,
            vec![PortRange::single(22, Protocol::Tcp).unwrap()],
            vec![],
            vec![],
            vec![],
            Some(UNSPECIFIED_IPV4),
            None,
        )
        .unwrap();
        let bytes = emit_service(&service).unwrap();
        let loaded = parse_service("esc", &bytes).unwrap();
        assert_eq!(loaded.short_name(), Some("a & b <c>"));
    }
}
