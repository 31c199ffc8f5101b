use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub post_content: String,
    pub user_id: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct UpsertPost {
    pub post_content: String,
}

/// Response to a successful insert.
#[derive(Debug, Serialize)]
pub struct PostCreated {
    pub id: String,
    pub post_content: String,
}

/// Payload of a `Post_Deleted` event.
#[derive(Debug, Serialize)]
pub struct PostRef {
    pub id: String,
}
