use crate::slug::slugify;
use crate::types::{ContentType, ItemStatus, NormalizedItem, SourceRecord};
use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// How a recognized source field maps into the normalized `data` object.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Copied through as-is; missing values become null.
    Text,
    /// Boolean flag; missing values default to false.
    Flag,
    /// Relationship array; normalized to `[{id, slug}]` regardless of
    /// whether the source gave raw ids or objects.
    Relation,
    /// Image reference; normalized to `{url, alt}` and left pointing at the
    /// source host (relocation happens later, in the driver).
    Image,
    /// Bilingual pair; folded into `{en, ar}` with the Arabic value read
    /// from the named sibling source field.
    Bilingual(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub source: &'static str,
    pub dest: &'static str,
    pub kind: FieldKind,
}

macro_rules! field {
    ($src:literal => $dst:literal, $kind:expr) => {
        FieldSpec {
            source: $src,
            dest: $dst,
            kind: $kind,
        }
    };
}

const POST_FIELDS: &[FieldSpec] = &[
    field!("post-body" => "body", FieldKind::Bilingual("post-body-ar")),
    field!("post-summary" => "summary", FieldKind::Bilingual("post-summary-ar")),
    field!("published-date" => "publishedDate", FieldKind::Text),
    field!("location" => "location", FieldKind::Text),
    field!("video-embed-code" => "videoEmbedCode", FieldKind::Text),
    field!("hero-image" => "heroImage", FieldKind::Image),
    field!("thumbnail-image" => "thumbnailImage", FieldKind::Image),
    field!("open-graph-image" => "openGraphImage", FieldKind::Image),
    field!("push-to-gr" => "pushToGR", FieldKind::Flag),
    field!("featured" => "featured", FieldKind::Flag),
    field!("programmes" => "programmes", FieldKind::Relation),
    field!("tags" => "tags", FieldKind::Relation),
    field!("authors" => "authors", FieldKind::Relation),
];

const EVENT_FIELDS: &[FieldSpec] = &[
    field!("description" => "description", FieldKind::Bilingual("description-ar")),
    field!("start-date" => "startDate", FieldKind::Text),
    field!("end-date" => "endDate", FieldKind::Text),
    field!("time" => "time", FieldKind::Text),
    field!("address" => "address", FieldKind::Text),
    field!("booking-link" => "bookingLink", FieldKind::Text),
    field!("hero-image" => "heroImage", FieldKind::Image),
    field!("thumbnail-image" => "thumbnailImage", FieldKind::Image),
    field!("featured" => "featured", FieldKind::Flag),
    field!("is-online" => "isOnline", FieldKind::Flag),
    field!("programmes" => "programmes", FieldKind::Relation),
    field!("speakers" => "speakers", FieldKind::Relation),
    field!("tags" => "tags", FieldKind::Relation),
];

const NEWS_FIELDS: &[FieldSpec] = &[
    field!("summary" => "summary", FieldKind::Bilingual("summary-ar")),
    field!("external-link" => "externalLink", FieldKind::Text),
    field!("published-date" => "publishedDate", FieldKind::Text),
    field!("source-name" => "sourceName", FieldKind::Text),
    field!("hero-image" => "heroImage", FieldKind::Image),
    field!("featured" => "featured", FieldKind::Flag),
    field!("programmes" => "programmes", FieldKind::Relation),
    field!("tags" => "tags", FieldKind::Relation),
];

const TEAM_FIELDS: &[FieldSpec] = &[
    field!("biography" => "biography", FieldKind::Bilingual("biography-ar")),
    field!("role" => "role", FieldKind::Bilingual("role-ar")),
    field!("order" => "order", FieldKind::Text),
    field!("email" => "email", FieldKind::Text),
    field!("linkedin-link" => "linkedinLink", FieldKind::Text),
    field!("photo" => "photo", FieldKind::Image),
    field!("is-alumni" => "isAlumni", FieldKind::Flag),
    field!("programmes" => "programmes", FieldKind::Relation),
];

const PROGRAMME_FIELDS: &[FieldSpec] = &[
    field!("description" => "description", FieldKind::Bilingual("description-ar")),
    field!("short-description" => "shortDescription", FieldKind::Bilingual("short-description-ar")),
    field!("start-year" => "startYear", FieldKind::Text),
    field!("website-link" => "websiteLink", FieldKind::Text),
    field!("order" => "order", FieldKind::Text),
    field!("logo" => "logo", FieldKind::Image),
    field!("hero-image" => "heroImage", FieldKind::Image),
    field!("push-to-gr" => "pushToGR", FieldKind::Flag),
    field!("active" => "active", FieldKind::Flag),
    field!("partners" => "partners", FieldKind::Relation),
    field!("tags" => "tags", FieldKind::Relation),
];

static FIELD_TABLES: Lazy<HashMap<ContentType, &'static [FieldSpec]>> = Lazy::new(|| {
    HashMap::from([
        (ContentType::Post, POST_FIELDS),
        (ContentType::Event, EVENT_FIELDS),
        (ContentType::News, NEWS_FIELDS),
        (ContentType::Team, TEAM_FIELDS),
        (ContentType::Programme, PROGRAMME_FIELDS),
    ])
});

pub fn table_for(content_type: ContentType) -> &'static [FieldSpec] {
    FIELD_TABLES[&content_type]
}

/// Image fields for a content type as `(source name, data key)` pairs. The
/// driver relocates under the source (kebab-case) name, which is what the
/// destination path convention uses, while reading/writing the camelCase key
/// inside `data`.
pub fn image_fields(content_type: ContentType) -> impl Iterator<Item = (&'static str, &'static str)> {
    table_for(content_type)
        .iter()
        .filter(|spec| matches!(spec.kind, FieldKind::Image))
        .map(|spec| (spec.source, spec.dest))
}

/// Map one source record into a normalized item.
///
/// Deterministic and total: unrecognized source fields are ignored, missing
/// fields produce null/false/empty defaults, and mapping itself never fails.
/// Image URLs pass through unmodified; relocation is a separate step.
pub fn map(record: &SourceRecord, content_type: ContentType) -> NormalizedItem {
    let fd = &record.field_data;

    let title = string_field(fd, "name")
        .or_else(|| string_field(fd, "title"))
        .unwrap_or_else(|| record.id.clone());

    let slug = string_field(fd, "slug").unwrap_or_else(|| slugify(&title));

    let mut data = Map::new();
    for spec in table_for(content_type) {
        let value = fd.get(spec.source);
        let mapped = match spec.kind {
            FieldKind::Text => value.cloned().unwrap_or(Value::Null),
            FieldKind::Flag => Value::Bool(value.and_then(Value::as_bool).unwrap_or(false)),
            FieldKind::Relation => normalize_relations(value),
            FieldKind::Image => normalize_image(value),
            FieldKind::Bilingual(ar_source) => json!({
                "en": value.cloned().unwrap_or(Value::Null),
                "ar": fd.get(ar_source).cloned().unwrap_or(Value::Null),
            }),
        };
        data.insert(spec.dest.to_string(), mapped);
    }

    NormalizedItem {
        id: None,
        title,
        content_type,
        slug,
        status: ItemStatus::from_is_draft(record.is_draft),
        data: Value::Object(data),
    }
}

fn string_field(field_data: &Value, name: &str) -> Option<String> {
    field_data
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Normalize a relationship field to `[{id, slug}]`. The source gives either
/// raw id strings or `{id, slug}` objects, sometimes a bare value instead of
/// an array.
fn normalize_relations(value: Option<&Value>) -> Value {
    let entries: Vec<Value> = match value {
        Some(Value::Array(items)) => items.iter().filter_map(relation_entry).collect(),
        Some(other) => relation_entry(other).into_iter().collect(),
        None => Vec::new(),
    };
    Value::Array(entries)
}

fn relation_entry(value: &Value) -> Option<Value> {
    match value {
        Value::String(id) if !id.is_empty() => Some(json!({ "id": id, "slug": Value::Null })),
        Value::Object(obj) => {
            let id = obj.get("id").and_then(Value::as_str)?;
            let slug = obj.get("slug").and_then(Value::as_str);
            Some(json!({ "id": id, "slug": slug }))
        }
        _ => None,
    }
}

/// Normalize an image field to `{url, alt}` or null when absent.
fn normalize_image(value: Option<&Value>) -> Value {
    match value {
        Some(Value::String(url)) if !url.is_empty() => json!({ "url": url, "alt": Value::Null }),
        Some(Value::Object(obj)) => {
            let url = obj.get("url").and_then(Value::as_str).unwrap_or("");
            if url.is_empty() {
                return Value::Null;
            }
            let alt = obj.get("alt").and_then(Value::as_str);
            json!({ "url": url, "alt": alt })
        }
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post_record(field_data: Value) -> SourceRecord {
        SourceRecord {
            id: "wf-item-1".to_string(),
            is_draft: false,
            is_archived: false,
            field_data,
        }
    }

    #[test]
    fn mapping_is_deterministic() {
        let record = post_record(json!({
            "name": "My Post",
            "slug": "my-post",
            "post-body": "<p>Body</p>",
            "programmes": ["prog-1", {"id": "prog-2", "slug": "second"}],
            "hero-image": {"url": "https://thirdparty.example/img.jpg", "alt": "Hero"},
        }));
        let a = map(&record, ContentType::Post);
        let b = map(&record, ContentType::Post);
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn status_round_trips_is_draft_for_all_types() {
        for content_type in ContentType::ALL {
            let mut record = post_record(json!({ "name": "X", "slug": "x" }));
            record.is_draft = true;
            assert_eq!(map(&record, content_type).status, ItemStatus::Draft);
            record.is_draft = false;
            assert_eq!(map(&record, content_type).status, ItemStatus::Published);
        }
    }

    #[test]
    fn relations_normalize_both_shapes() {
        let record = post_record(json!({
            "name": "My Post",
            "slug": "my-post",
            "programmes": ["prog-1", {"id": "prog-2", "slug": "second"}],
        }));
        let item = map(&record, ContentType::Post);
        assert_eq!(
            item.data["programmes"],
            json!([
                {"id": "prog-1", "slug": null},
                {"id": "prog-2", "slug": "second"},
            ])
        );
    }

    #[test]
    fn missing_slug_derives_from_title() {
        let record = post_record(json!({ "name": "Annual Report 2023!" }));
        let item = map(&record, ContentType::Post);
        assert_eq!(item.slug, "annual-report-2023");
    }

    #[test]
    fn missing_title_falls_back_to_source_id() {
        let record = post_record(json!({}));
        let item = map(&record, ContentType::Post);
        assert_eq!(item.title, "wf-item-1");
    }

    #[test]
    fn missing_fields_default_to_null_and_false() {
        let record = post_record(json!({ "name": "X", "slug": "x" }));
        let item = map(&record, ContentType::Post);
        assert_eq!(item.data["publishedDate"], Value::Null);
        assert_eq!(item.data["pushToGR"], json!(false));
        assert_eq!(item.data["heroImage"], Value::Null);
        assert_eq!(item.data["tags"], json!([]));
    }

    #[test]
    fn unrecognized_fields_are_ignored() {
        let record = post_record(json!({
            "name": "X",
            "slug": "x",
            "some-legacy-field": "whatever",
        }));
        let item = map(&record, ContentType::Post);
        assert!(item.data.get("some-legacy-field").is_none());
        assert!(item.data.get("someLegacyField").is_none());
    }

    #[test]
    fn bilingual_fields_fold_into_en_ar() {
        let record = post_record(json!({
            "name": "X",
            "slug": "x",
            "post-summary": "English summary",
            "post-summary-ar": "ملخص",
        }));
        let item = map(&record, ContentType::Post);
        assert_eq!(
            item.data["summary"],
            json!({"en": "English summary", "ar": "ملخص"})
        );
    }

    #[test]
    fn image_fields_pass_through_source_urls() {
        let record = post_record(json!({
            "name": "X",
            "slug": "x",
            "hero-image": {"url": "https://thirdparty.example/img.jpg", "alt": "Hero"},
            "thumbnail-image": "https://thirdparty.example/thumb.png",
        }));
        let item = map(&record, ContentType::Post);
        assert_eq!(
            item.data["heroImage"],
            json!({"url": "https://thirdparty.example/img.jpg", "alt": "Hero"})
        );
        assert_eq!(
            item.data["thumbnailImage"],
            json!({"url": "https://thirdparty.example/thumb.png", "alt": null})
        );
    }
}
