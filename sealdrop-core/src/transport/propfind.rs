use super::{FolderEntry, FolderProperty};
use crate::{DropError, FolderId, Result};
use quick_xml::Reader;
use quick_xml::events::Event;

pub fn propfind_body(properties: &[FolderProperty]) -> String {
    let props: String = properties.iter().map(|prop| prop.xml_element()).collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <d:propfind xmlns:d=\"DAV:\" xmlns:oc=\"http://owncloud.org/ns\">\
         <d:prop>{}</d:prop></d:propfind>",
        props
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    None,
    Href,
    FileId,
    ResourceType,
}

/// Parses a WebDAV multistatus body into one entry per `<d:response>`.
pub fn parse_multistatus(body: &str) -> Result<Vec<FolderEntry>> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<FolderEntry> = None;
    let mut field = Field::None;

    loop {
        let event = reader.read_event().map_err(|error| {
            DropError::Deserialization(format!(
                "invalid multistatus at byte {}: {}",
                reader.buffer_position(),
                error
            ))
        })?;

        match event {
            Event::Start(element) => match element.local_name().as_ref() {
                b"response" => current = Some(FolderEntry::default()),
                b"href" => field = Field::Href,
                b"fileid" => field = Field::FileId,
                b"resourcetype" => field = Field::ResourceType,
                b"collection" => mark_collection(current.as_mut(), field),
                _ => {}
            },
            Event::Empty(element) => {
                if element.local_name().as_ref() == b"collection" {
                    mark_collection(current.as_mut(), field);
                }
            }
            Event::Text(text) => {
                let Some(entry) = current.as_mut() else {
                    continue;
                };
                let value = text.unescape().map_err(|error| {
                    DropError::Deserialization(format!("invalid multistatus text: {}", error))
                })?;
                match field {
                    Field::Href => entry.href = value.into_owned(),
                    Field::FileId if !value.is_empty() => {
                        entry.file_id = Some(FolderId::from(value.as_ref()))
                    }
                    _ => {}
                }
            }
            Event::End(element) => match element.local_name().as_ref() {
                b"response" => {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                b"href" | b"fileid" | b"resourcetype" => field = Field::None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

fn mark_collection(entry: Option<&mut FolderEntry>, field: Field) {
    if field != Field::ResourceType {
        return;
    }
    if let Some(entry) = entry {
        entry.is_collection = true;
    }
}
