//! `ietf-restconf:errors` and `ietf-yang-patch:yang-patch-status` bodies.

use serde::Serialize;

use crate::backend::{PatchStatus, PrettyPrint, YangError};
use crate::negotiation::MessageEncoding;

use super::xml::XmlWriter;

const RESTCONF_NS: &str = "urn:ietf:params:xml:ns:yang:ietf-restconf";
const YANG_PATCH_NS: &str = "urn:ietf:params:xml:ns:yang:ietf-yang-patch";

#[derive(Serialize)]
struct ErrorEntry<'a> {
    #[serde(rename = "error-type")]
    error_type: &'static str,
    #[serde(rename = "error-tag")]
    error_tag: &'static str,
    #[serde(rename = "error-app-tag", skip_serializing_if = "Option::is_none")]
    error_app_tag: Option<&'a str>,
    #[serde(rename = "error-path", skip_serializing_if = "Option::is_none")]
    error_path: Option<&'a str>,
    #[serde(rename = "error-message", skip_serializing_if = "Option::is_none")]
    error_message: Option<&'a str>,
    #[serde(rename = "error-info", skip_serializing_if = "Option::is_none")]
    error_info: Option<&'a str>,
}

impl<'a> From<&'a YangError> for ErrorEntry<'a> {
    fn from(error: &'a YangError) -> Self {
        Self {
            error_type: error.error_type.as_str(),
            error_tag: error.error_tag.as_str(),
            error_app_tag: error.error_app_tag.as_deref(),
            error_path: error.error_path.as_deref(),
            error_message: error.error_message.as_deref(),
            error_info: error.error_info.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct ErrorList<'a> {
    error: Vec<ErrorEntry<'a>>,
}

impl<'a> ErrorList<'a> {
    fn new(errors: &'a [YangError]) -> Self {
        Self {
            error: errors.iter().map(ErrorEntry::from).collect(),
        }
    }
}

#[derive(Serialize)]
struct ErrorsDocument<'a> {
    #[serde(rename = "ietf-restconf:errors")]
    errors: ErrorList<'a>,
}

fn write_json<T: Serialize>(value: &T, pretty: PrettyPrint, out: &mut Vec<u8>) -> Result<(), serde_json::Error> {
    if pretty.0 {
        serde_json::to_writer_pretty(out, value)
    } else {
        serde_json::to_writer(out, value)
    }
}

fn write_xml_errors(writer: &mut XmlWriter<'_>, errors: &[YangError], namespace: Option<&str>) {
    writer.start("errors", namespace);
    for error in errors {
        writer.start("error", None);
        writer.leaf("error-type", None, error.error_type.as_str());
        writer.leaf("error-tag", None, error.error_tag.as_str());
        let optional = [
            ("error-app-tag", &error.error_app_tag),
            ("error-path", &error.error_path),
            ("error-message", &error.error_message),
            ("error-info", &error.error_info),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                writer.leaf(name, None, value);
            }
        }
        writer.end("error");
    }
    writer.end("errors");
}

/// Write an RFC 8040 §7.1 errors document.
pub fn format_errors(
    errors: &[YangError],
    encoding: MessageEncoding,
    pretty: PrettyPrint,
    out: &mut Vec<u8>,
) -> Result<(), serde_json::Error> {
    match encoding {
        MessageEncoding::Json => write_json(
            &ErrorsDocument {
                errors: ErrorList::new(errors),
            },
            pretty,
            out,
        ),
        MessageEncoding::Xml => {
            let mut writer = XmlWriter::new(out, pretty.0);
            write_xml_errors(&mut writer, errors, Some(RESTCONF_NS));
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct EditEntry<'a> {
    #[serde(rename = "edit-id")]
    edit_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ok: Option<[(); 1]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<ErrorList<'a>>,
}

#[derive(Serialize)]
struct EditStatus<'a> {
    edit: Vec<EditEntry<'a>>,
}

#[derive(Serialize)]
struct PatchStatusBody<'a> {
    #[serde(rename = "patch-id")]
    patch_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ok: Option<[(); 1]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<ErrorList<'a>>,
    #[serde(rename = "edit-status", skip_serializing_if = "Option::is_none")]
    edit_status: Option<EditStatus<'a>>,
}

#[derive(Serialize)]
struct PatchStatusDocument<'a> {
    #[serde(rename = "ietf-yang-patch:yang-patch-status")]
    status: PatchStatusBody<'a>,
}

/// Write an RFC 8072 §2.3 `yang-patch-status` document. Per-edit status is
/// only reported when the patch failed.
pub fn format_patch_status(
    status: &PatchStatus,
    encoding: MessageEncoding,
    pretty: PrettyPrint,
    out: &mut Vec<u8>,
) -> Result<(), serde_json::Error> {
    match encoding {
        MessageEncoding::Json => {
            let edit_status = (!status.ok && !status.edits.is_empty()).then(|| EditStatus {
                edit: status
                    .edits
                    .iter()
                    .map(|edit| EditEntry {
                        edit_id: &edit.edit_id,
                        ok: edit.ok.then_some([()]),
                        errors: (!edit.errors.is_empty()).then(|| ErrorList::new(&edit.errors)),
                    })
                    .collect(),
            });
            let document = PatchStatusDocument {
                status: PatchStatusBody {
                    patch_id: &status.patch_id,
                    ok: status.ok.then_some([()]),
                    errors: (!status.global_errors.is_empty())
                        .then(|| ErrorList::new(&status.global_errors)),
                    edit_status,
                },
            };
            write_json(&document, pretty, out)
        }
        MessageEncoding::Xml => {
            let mut writer = XmlWriter::new(out, pretty.0);
            writer.start("yang-patch-status", Some(YANG_PATCH_NS));
            writer.leaf("patch-id", None, &status.patch_id);
            if status.ok {
                writer.empty("ok", None);
            }
            if !status.global_errors.is_empty() {
                write_xml_errors(&mut writer, &status.global_errors, None);
            }
            if !status.ok && !status.edits.is_empty() {
                writer.start("edit-status", None);
                for edit in &status.edits {
                    writer.start("edit", None);
                    writer.leaf("edit-id", None, &edit.edit_id);
                    if edit.ok {
                        writer.empty("ok", None);
                    }
                    if !edit.errors.is_empty() {
                        write_xml_errors(&mut writer, &edit.errors, None);
                    }
                    writer.end("edit");
                }
                writer.end("edit-status");
            }
            writer.end("yang-patch-status");
            Ok(())
        }
    }
}
