//! Serde mapping of the profile-lookup response document.
//!
//! Every field defaults so partially-populated or empty documents decode
//! without error; an absent `user` record is the ordinary "still suspended"
//! steady state.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileEnvelope {
    #[serde(default)]
    pub data: ProfileData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileData {
    #[serde(default)]
    pub user: Option<UserRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub edge_followed_by: EdgeCount,
    #[serde(default)]
    pub edge_follow: EdgeCount,
    #[serde(default)]
    pub edge_owner_to_timeline_media: EdgeCount,
    #[serde(default)]
    pub profile_pic_url: Option<String>,
    #[serde(default)]
    pub profile_pic_url_hd: Option<String>,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub biography: String,
    #[serde(default)]
    pub is_verified: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct EdgeCount {
    #[serde(default)]
    pub count: u64,
}

impl ProfileEnvelope {
    /// The nested user record, when the account is visible.
    pub fn user(&self) -> Option<&UserRecord> {
        self.data.user.as_ref()
    }
}

impl UserRecord {
    pub fn followers(&self) -> u64 {
        self.edge_followed_by.count
    }

    pub fn following(&self) -> u64 {
        self.edge_follow.count
    }

    pub fn posts(&self) -> u64 {
        self.edge_owner_to_timeline_media.count
    }

    /// HD picture URL when present, otherwise the standard one.
    pub fn picture_url(&self) -> Option<&str> {
        self.profile_pic_url_hd
            .as_deref()
            .or(self.profile_pic_url.as_deref())
    }
}
