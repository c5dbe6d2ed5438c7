//! Session-bound gateway.
//!
//! Orchestrators hold one `Arc<dyn RemoteGateway>` for their whole lifetime,
//! while the login behind it may change. [`SessionGateway`] resolves the
//! active session on every call.

use crate::manager::SharedSession;
use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::remote::{
    AssetStatistics, PersonSummary, RemoteGateway, UploadRequest, UploadedAsset, UserInfo,
};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;

/// Delegates every call to the gateway of the active session.
#[derive(Clone)]
pub struct SessionGateway {
    active: SharedSession,
}

impl SessionGateway {
    pub(crate) fn new(active: SharedSession) -> Self {
        Self { active }
    }

    async fn current(&self) -> Result<Arc<dyn RemoteGateway>> {
        self.active
            .read()
            .await
            .as_ref()
            .map(|active| active.gateway.clone())
            .ok_or_else(|| BridgeError::Unauthorized("not signed in".to_string()))
    }
}

#[async_trait]
impl RemoteGateway for SessionGateway {
    async fn upload(&self, request: &UploadRequest) -> Result<UploadedAsset> {
        self.current().await?.upload(request).await
    }

    async fn download_asset(&self, asset_id: &str) -> Result<Bytes> {
        self.current().await?.download_asset(asset_id).await
    }

    async fn get_original_filename(&self, asset_id: &str) -> Result<String> {
        self.current().await?.get_original_filename(asset_id).await
    }

    async fn get_asset_tags(&self, asset_id: &str) -> Result<Vec<String>> {
        self.current().await?.get_asset_tags(asset_id).await
    }

    async fn get_asset_description(&self, asset_id: &str) -> Result<Option<String>> {
        self.current().await?.get_asset_description(asset_id).await
    }

    async fn update_description(&self, asset_id: &str, text: &str) -> Result<()> {
        self.current().await?.update_description(asset_id, text).await
    }

    async fn list_albums(&self) -> Result<HashMap<String, String>> {
        self.current().await?.list_albums().await
    }

    async fn create_album(&self, name: &str) -> Result<String> {
        self.current().await?.create_album(name).await
    }

    async fn add_assets_to_album(&self, album_id: &str, asset_ids: &[String]) -> Result<()> {
        self.current()
            .await?
            .add_assets_to_album(album_id, asset_ids)
            .await
    }

    async fn list_album_assets(&self, album_id: &str) -> Result<Vec<String>> {
        self.current().await?.list_album_assets(album_id).await
    }

    async fn list_tags(&self) -> Result<HashMap<String, String>> {
        self.current().await?.list_tags().await
    }

    async fn create_tag(&self, name: &str) -> Result<String> {
        self.current().await?.create_tag(name).await
    }

    async fn tag_assets(&self, tag_id: &str, asset_ids: &[String]) -> Result<()> {
        self.current().await?.tag_assets(tag_id, asset_ids).await
    }

    async fn list_tag_assets(&self, tag_id: &str) -> Result<Vec<String>> {
        self.current().await?.list_tag_assets(tag_id).await
    }

    async fn current_user(&self) -> Result<UserInfo> {
        self.current().await?.current_user().await
    }

    async fn asset_statistics(&self) -> Result<AssetStatistics> {
        self.current().await?.asset_statistics().await
    }

    async fn list_people(&self) -> Result<Vec<PersonSummary>> {
        self.current().await?.list_people().await
    }

    async fn list_person_assets(&self, person_id: &str) -> Result<Vec<String>> {
        self.current().await?.list_person_assets(person_id).await
    }

    async fn list_all_assets(&self) -> Result<Vec<String>> {
        self.current().await?.list_all_assets().await
    }

    async fn smart_search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        self.current().await?.smart_search(query, limit).await
    }
}
