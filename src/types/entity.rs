use serde::{Deserialize, Serialize};

/// Identifier shared by every synchronized entity.
pub type EntityId = i64;

/// A server-owned record that can live in an [`EntitySnapshot`].
///
/// Implementors only need a stable identity; the reconciler treats the
/// rest of the value as opaque and replaces it wholesale on update.
///
/// [`EntitySnapshot`]: crate::reconciler::EntitySnapshot
pub trait Entity: Clone + Send + Sync + 'static {
    fn id(&self) -> EntityId;
}

/// One piece of content inside a capsule.
///
/// The server is free to grow this record; everything beyond the id is
/// kept verbatim in `fields` and handed back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: EntityId,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Entity for ContentItem {
    fn id(&self) -> EntityId {
        self.id
    }
}

/// One notification in a user's feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: EntityId,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Entity for Notification {
    fn id(&self) -> EntityId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_item_keeps_unknown_fields() {
        let item: ContentItem = serde_json::from_value(json!({
            "id": 7,
            "caption": "first day",
            "mediaUrl": "https://cdn.example/x.jpg",
        }))
        .unwrap();

        assert_eq!(item.id(), 7);
        assert_eq!(item.fields["caption"], json!("first day"));

        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["mediaUrl"], json!("https://cdn.example/x.jpg"));
    }

    #[test]
    fn notification_round_trips_extra_fields() {
        let note: Notification = serde_json::from_value(json!({
            "id": 3,
            "message": "Ana commented on your capsule",
            "read": false,
        }))
        .unwrap();

        assert_eq!(note.id(), 3);
        assert_eq!(
            serde_json::to_value(&note).unwrap()["read"],
            json!(false)
        );
    }
}
