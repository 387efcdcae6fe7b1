//! Admin-console glue around the Collection Store.
//!
//! An [`AdminConsole`] owns one [`StoreSession`] and the in-memory copies
//! of the collections its forms edit. It pumps change notifications from
//! sibling sessions, cancels an edit when the record being edited was
//! deleted elsewhere, and surfaces a one-time warning when nothing will
//! persist. Server-backed writes go through [`ProfileSync`], authorised
//! by a bearer token from an injected identity provider.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::record::{BlogPost, RouteTagOverride, WithdrawnRouteEntry};
use crate::sanitise::{
    default_blog_posts, sanitise_blog_post, sanitise_route_tag_override,
    sanitise_withdrawn_entry,
};
use crate::store::{CollectionKind, StoreSession, to_candidates};

// ------------- Identity provider -------------

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct UserInfo {
    pub uid: String,
    pub display_name: String,
    pub email: String,
}

/// The opaque identity provider (Firebase in production). Only two
/// capabilities are consumed: who is signed in, and a short-lived bearer
/// token for them.
pub trait AuthProvider {
    fn current_user(&self) -> Option<UserInfo>;
    fn id_token(&self) -> impl Future<Output = Result<String>> + Send;
}

// ------------- ProfileSync -------------

/// Everything the admin console can push to the backend profile API in
/// one request.
#[derive(Serialize)]
pub struct ProfileSnapshot<'a> {
    #[serde(rename = "withdrawnRoutes")]
    pub withdrawn_routes: &'a [WithdrawnRouteEntry],
    #[serde(rename = "routeTagOverrides")]
    pub route_tag_overrides: &'a [RouteTagOverride],
    #[serde(rename = "blogPosts")]
    pub blog_posts: &'a [BlogPost],
}

pub struct ProfileSync {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl ProfileSync {
    /// `endpoint == None` means profile sync is not configured; pushes
    /// become successful no-ops so local-only deployments keep working.
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    /// Pushes the snapshot with `Authorization: Bearer <token>`. An
    /// unauthenticated caller or a rejected token is reported as an
    /// error; it never panics and never mutates anything locally.
    pub async fn push<A: AuthProvider>(
        &self,
        auth: &A,
        snapshot: &ProfileSnapshot<'_>,
    ) -> Result<()> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(());
        };
        if auth.current_user().is_none() {
            return Err(StoreError::Unauthenticated);
        }
        let token = auth.id_token().await?;
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(token)
            .json(snapshot)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(StoreError::Authorization(response.status().to_string()));
        }
        response.error_for_status()?;
        Ok(())
    }
}

// ------------- AdminConsole -------------

/// User-visible notices raised by the console, drained by the rendering
/// layer.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AdminNotice {
    /// Shown once per page load when the storage probe failed.
    StorageUnavailable,
    /// The record being edited was deleted by another session; the form
    /// has been reset.
    EditCancelled { route: String },
}

pub struct AdminConsole {
    session: StoreSession,
    withdrawn: Vec<WithdrawnRouteEntry>,
    overrides: Vec<RouteTagOverride>,
    posts: Vec<BlogPost>,
    editing: Option<String>,
    notices: Vec<AdminNotice>,
}

impl AdminConsole {
    pub fn new(session: StoreSession) -> Self {
        let withdrawn = session.withdrawn_routes();
        let overrides = session.route_tag_overrides();
        // the write base is the stored set only; the display accessor
        // substitutes the built-in posts when this is empty
        let posts = session.stored_blog_posts();
        let mut notices = Vec::new();
        if !session.storage_available() {
            notices.push(AdminNotice::StorageUnavailable);
        }
        Self {
            session,
            withdrawn,
            overrides,
            posts,
            editing: None,
            notices,
        }
    }

    pub fn session(&self) -> &StoreSession {
        &self.session
    }

    pub fn withdrawn_routes(&self) -> &[WithdrawnRouteEntry] {
        &self.withdrawn
    }

    pub fn route_tag_overrides(&self) -> &[RouteTagOverride] {
        &self.overrides
    }

    /// The feed as rendered: the built-in posts stand in when nothing is
    /// stored, exactly as on the public pages.
    pub fn blog_posts(&self) -> Vec<BlogPost> {
        if self.posts.is_empty() {
            default_blog_posts(self.session.store().ids())
        } else {
            self.posts.clone()
        }
    }

    pub fn take_notices(&mut self) -> Vec<AdminNotice> {
        std::mem::take(&mut self.notices)
    }

    // --- edit session ---

    pub fn begin_edit(&mut self, id: &str) -> Option<&WithdrawnRouteEntry> {
        let entry = self.withdrawn.iter().find(|entry| entry.id == id)?;
        self.editing = Some(entry.id.clone());
        self.withdrawn.iter().find(|entry| entry.id == id)
    }

    pub fn editing(&self) -> Option<&WithdrawnRouteEntry> {
        let id = self.editing.as_deref()?;
        self.withdrawn.iter().find(|entry| entry.id == id)
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    // --- withdrawn routes ---

    /// Upserts one withdrawn route from a form draft. The draft must pass
    /// the same required-field check the form performs before submission;
    /// a draft without a usable route is rejected rather than silently
    /// dropped at this surface.
    pub fn save_withdrawn_route(&mut self, draft: &Value) -> Result<WithdrawnRouteEntry> {
        let entry = sanitise_withdrawn_entry(draft, self.session.store().ids())
            .ok_or_else(|| StoreError::Validation("a route name is required".into()))?;
        let mut next = self.withdrawn.clone();
        match next.iter_mut().find(|existing| existing.id == entry.id) {
            Some(existing) => *existing = entry.clone(),
            None => next.push(entry.clone()),
        }
        self.withdrawn = self.session.set_withdrawn_routes(&to_candidates(&next));
        if self.editing.as_deref() == Some(entry.id.as_str()) {
            self.editing = None;
        }
        self.withdrawn
            .iter()
            .find(|saved| saved.id == entry.id)
            .cloned()
            .ok_or_else(|| StoreError::Storage("saved record missing from write result".into()))
    }

    /// Remote-first variant: the profile API must accept the new state
    /// before the local collection is mutated, so an authorization
    /// failure leaves both the store and the in-memory copy untouched.
    pub async fn save_withdrawn_route_synced<A: AuthProvider>(
        &mut self,
        draft: &Value,
        auth: &A,
        sync: &ProfileSync,
    ) -> Result<WithdrawnRouteEntry> {
        let entry = sanitise_withdrawn_entry(draft, self.session.store().ids())
            .ok_or_else(|| StoreError::Validation("a route name is required".into()))?;
        let mut next = self.withdrawn.clone();
        match next.iter_mut().find(|existing| existing.id == entry.id) {
            Some(existing) => *existing = entry.clone(),
            None => next.push(entry.clone()),
        }
        sync.push(
            auth,
            &ProfileSnapshot {
                withdrawn_routes: &next,
                route_tag_overrides: &self.overrides,
                blog_posts: &self.posts,
            },
        )
        .await?;
        self.withdrawn = self.session.set_withdrawn_routes(&to_candidates(&next));
        if self.editing.as_deref() == Some(entry.id.as_str()) {
            self.editing = None;
        }
        self.withdrawn
            .iter()
            .find(|saved| saved.id == entry.id)
            .cloned()
            .ok_or_else(|| StoreError::Storage("saved record missing from write result".into()))
    }

    pub fn delete_withdrawn_route(&mut self, id: &str) -> bool {
        let before = self.withdrawn.len();
        let next: Vec<WithdrawnRouteEntry> = self
            .withdrawn
            .iter()
            .filter(|entry| entry.id != id)
            .cloned()
            .collect();
        if next.len() == before {
            return false;
        }
        self.withdrawn = self.session.set_withdrawn_routes(&to_candidates(&next));
        if self.editing.as_deref() == Some(id) {
            self.editing = None;
        }
        true
    }

    // --- route tag overrides ---

    pub fn save_route_tag_override(&mut self, draft: &Value) -> Result<RouteTagOverride> {
        let entry = sanitise_route_tag_override(draft, self.session.store().ids())
            .ok_or_else(|| {
                StoreError::Validation("a route name and at least one tag are required".into())
            })?;
        let mut next = self.overrides.clone();
        match next.iter_mut().find(|existing| existing.id == entry.id) {
            Some(existing) => *existing = entry.clone(),
            None => next.push(entry.clone()),
        }
        self.overrides = self.session.set_route_tag_overrides(&to_candidates(&next));
        self.overrides
            .iter()
            .find(|saved| saved.id == entry.id)
            .cloned()
            .ok_or_else(|| StoreError::Storage("saved record missing from write result".into()))
    }

    pub fn delete_route_tag_override(&mut self, id: &str) -> bool {
        let next: Vec<RouteTagOverride> = self
            .overrides
            .iter()
            .filter(|entry| entry.id != id)
            .cloned()
            .collect();
        if next.len() == self.overrides.len() {
            return false;
        }
        self.overrides = self.session.set_route_tag_overrides(&to_candidates(&next));
        true
    }

    // --- blog posts ---

    pub fn save_blog_post(&mut self, draft: &Value) -> Result<BlogPost> {
        let post = sanitise_blog_post(draft, self.session.store().ids())
            .ok_or_else(|| StoreError::Validation("a title is required".into()))?;
        let mut next = self.posts.clone();
        match next.iter_mut().find(|existing| existing.id == post.id) {
            Some(existing) => *existing = post.clone(),
            None => next.push(post.clone()),
        }
        self.posts = self.session.set_blog_posts(&to_candidates(&next));
        self.posts
            .iter()
            .find(|saved| saved.id == post.id)
            .cloned()
            .ok_or_else(|| StoreError::Storage("saved record missing from write result".into()))
    }

    pub fn delete_blog_post(&mut self, id: &str) -> bool {
        let next: Vec<BlogPost> = self
            .posts
            .iter()
            .filter(|post| post.id != id)
            .cloned()
            .collect();
        if next.len() == self.posts.len() {
            return false;
        }
        // deleting the last stored post makes the built-in set reappear
        // in the rendered feed, but the write base stays empty
        self.posts = self.session.set_blog_posts(&to_candidates(&next));
        true
    }

    // --- change propagation ---

    /// Drains change notifications from sibling sessions, reloads the
    /// affected collections and resets the edit form if the record being
    /// edited no longer exists. Returns the kinds that were reloaded so
    /// the rendering layer knows what to refresh.
    pub fn pump_changes(&mut self) -> Vec<CollectionKind> {
        let mut reloaded = Vec::new();
        for event in self.session.drain_changes() {
            if reloaded.contains(&event.kind) {
                continue;
            }
            match event.kind {
                CollectionKind::WithdrawnRoutes => {
                    let editing_before = self.editing().cloned();
                    self.withdrawn = self.session.withdrawn_routes();
                    if let Some(edited) = editing_before {
                        if !self.withdrawn.iter().any(|entry| entry.id == edited.id) {
                            warn!(route = %edited.route, "record deleted in another session, resetting the form");
                            self.editing = None;
                            self.notices.push(AdminNotice::EditCancelled {
                                route: edited.route,
                            });
                        }
                    }
                }
                CollectionKind::RouteTagOverrides => {
                    self.overrides = self.session.route_tag_overrides();
                }
                CollectionKind::BlogPosts => {
                    self.posts = self.session.stored_blog_posts();
                }
            }
            reloaded.push(event.kind);
        }
        reloaded
    }
}
