// src/ingest/xml.rs
//! Page parser / record flattener for the transaction APIs.
//!
//! Response shape:
//! `<response><header><resultCode/><resultMsg/></header>
//!  <body><items><item>..leaves..</item></items><totalCount/></body></response>`
//!
//! Each `<item>`'s direct children become one `RawRecord` (tag → trimmed text,
//! `None` for empty leaves). No type coercion happens here.

use metrics::{counter, histogram};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::ingest::types::Page;
use crate::record::RawRecord;

/// Why a page could not be turned into records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    Malformed(String),
    /// The service answered with a failure envelope or result code.
    Upstream { code: String, message: String },
}

const OK_CODES: [&str; 2] = ["00", "000"];

pub fn parse_page(xml: &str) -> Result<Page, PageError> {
    let t0 = std::time::Instant::now();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut current: Option<RawRecord> = None;
    let mut items = Vec::new();
    let mut total_count: Option<u64> = None;
    let mut result_code: Option<String> = None;
    let mut result_msg: Option<String> = None;
    let mut auth_msg: Option<String> = None;
    let mut saw_root = false;
    let mut service_envelope = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if !saw_root {
                    saw_root = true;
                    service_envelope = name == "OpenAPI_ServiceResponse";
                }
                if name == "item" && current.is_none() {
                    current = Some(RawRecord::new());
                }
                stack.push(name);
                text.clear();
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                saw_root = true;
                if let Some(rec) = current.as_mut() {
                    if stack.last().map(String::as_str) == Some("item") {
                        rec.insert(name, None);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                let s = t
                    .unescape()
                    .map_err(|e| PageError::Malformed(e.to_string()))?;
                text.push_str(&s);
            }
            Ok(Event::CData(c)) => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Ok(Event::End(_)) => {
                let Some(name) = stack.pop() else {
                    return Err(PageError::Malformed("unbalanced end tag".into()));
                };
                let value = text.trim();
                let value = (!value.is_empty()).then(|| value.to_string());
                let parent = stack.last().map(String::as_str);

                if name == "item" && current.is_some() && !stack.iter().any(|n| n == "item") {
                    items.extend(current.take());
                } else if parent == Some("item") {
                    if let Some(rec) = current.as_mut() {
                        rec.insert(name, value);
                    }
                } else {
                    match name.as_str() {
                        "totalCount" => {
                            total_count = value.as_deref().and_then(|v| v.parse().ok())
                        }
                        "resultCode" => result_code = value,
                        "resultMsg" => result_msg = value,
                        "returnAuthMsg" | "errMsg" => {
                            if auth_msg.is_none() || name == "returnAuthMsg" {
                                auth_msg = value;
                            }
                        }
                        _ => {}
                    }
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(PageError::Malformed(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
    }

    if !saw_root {
        return Err(PageError::Malformed("no XML element in response".into()));
    }
    if !stack.is_empty() {
        return Err(PageError::Malformed(format!(
            "unexpected end of document inside <{}>",
            stack.join("/")
        )));
    }
    if service_envelope {
        return Err(PageError::Upstream {
            code: result_code.unwrap_or_else(|| "SERVICE_ERROR".into()),
            message: auth_msg.unwrap_or_else(|| "service error envelope".into()),
        });
    }
    if let Some(code) = result_code {
        if !OK_CODES.contains(&code.as_str()) {
            return Err(PageError::Upstream {
                code,
                message: result_msg.unwrap_or_default(),
            });
        }
    }

    histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("ingest_items_parsed_total").increment(items.len() as u64);
    Ok(Page { total_count, items })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<response>
  <header><resultCode>000</resultCode><resultMsg>OK</resultMsg></header>
  <body>
    <items>
      <item>
        <aptNm>래미안 &amp; 힐</aptNm>
        <dealAmount>   125,000</dealAmount>
        <excluUseAr>84.97</excluUseAr>
        <floor></floor>
        <rgstDate/>
      </item>
      <item><aptNm><![CDATA[자이]]></aptNm><dealAmount>90,000</dealAmount></item>
    </items>
    <numOfRows>10</numOfRows><pageNo>1</pageNo><totalCount>2</totalCount>
  </body>
</response>"#;

    #[test]
    fn flattens_items_in_order() {
        let page = parse_page(PAGE).unwrap();
        assert_eq!(page.total_count, Some(2));
        assert_eq!(page.items.len(), 2);
        let first = &page.items[0];
        assert_eq!(first.get("aptNm"), Some(Some("래미안 & 힐")));
        assert_eq!(first.get("dealAmount"), Some(Some("125,000")));
        assert_eq!(first.get("floor"), Some(None));
        assert_eq!(first.get("rgstDate"), Some(None));
        let keys: Vec<_> = first.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["aptNm", "dealAmount", "excluUseAr", "floor", "rgstDate"]);
        assert_eq!(page.items[1].get("aptNm"), Some(Some("자이")));
    }

    #[test]
    fn missing_or_garbage_total_is_none() {
        let xml = "<response><body><items/><totalCount>n/a</totalCount></body></response>";
        let page = parse_page(xml).unwrap();
        assert_eq!(page.total_count, None);
        assert!(page.items.is_empty());

        let xml = "<response><body><items></items></body></response>";
        assert_eq!(parse_page(xml).unwrap().total_count, None);
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(matches!(
            parse_page("<response><body></response>"),
            Err(PageError::Malformed(_))
        ));
        assert!(matches!(
            parse_page("<response><body><items>"),
            Err(PageError::Malformed(_))
        ));
        assert!(matches!(
            parse_page("Unexpected errors"),
            Err(PageError::Malformed(_))
        ));
    }

    #[test]
    fn upstream_failure_codes_surface() {
        let xml = "<response><header><resultCode>03</resultCode><resultMsg>NO_DATA</resultMsg></header></response>";
        assert_eq!(
            parse_page(xml),
            Err(PageError::Upstream {
                code: "03".into(),
                message: "NO_DATA".into()
            })
        );

        let xml = "<OpenAPI_ServiceResponse><cmmMsgHeader><errMsg>SERVICE ERROR</errMsg>\
                   <returnAuthMsg>SERVICE_KEY_IS_NOT_REGISTERED_ERROR</returnAuthMsg>\
                   <returnReasonCode>30</returnReasonCode></cmmMsgHeader></OpenAPI_ServiceResponse>";
        match parse_page(xml) {
            Err(PageError::Upstream { message, .. }) => {
                assert_eq!(message, "SERVICE_KEY_IS_NOT_REGISTERED_ERROR")
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }
}
