use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Base64 block id for the block at `index`.
///
/// The storage service requires every id of one blob to have the same
/// encoded length, so the index is zero-padded.
pub fn block_id(index: usize) -> String {
    STANDARD.encode(format!("block-{index:08}"))
}

/// Body of the commit-block-list request, listing ids in the given order.
pub fn block_list_xml<S: AsRef<str>>(ids: &[S]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?><BlockList>"#);
    for id in ids {
        xml.push_str("<Latest>");
        xml.push_str(id.as_ref());
        xml.push_str("</Latest>");
    }
    xml.push_str("</BlockList>");
    xml
}
