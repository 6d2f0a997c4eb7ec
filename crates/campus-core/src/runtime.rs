use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};
use tracing::{debug, info, warn};

use crate::clock::unix_now;
use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::events::CoreEvent;
use crate::feed::{rank_feed, FeedContext};
use crate::intents::WriteIntents;
use crate::models::{
    AppState, ConversationSummary, Course, DepartmentChannel, FeedMode, Group, Identity,
    LocalNotification, Notice, Post, PreferencesStorage, StoryEntity, UserProfile,
};
use crate::reconcile::ChangeReconciler;
use crate::scope::{Resolution, Scope, ScopeResolver};
use crate::stats::SnapshotStats;
use crate::stories::{aggregate_stories, StoryContext};
use crate::store::{AppDataStore, Collection, Delivery, DocumentStore};
use crate::subscriptions::SubscriptionManager;

type NotificationCallback = Box<dyn Fn(&LocalNotification)>;

/// Owns the session: identity, live queries, cache and derived views.
///
/// Single-threaded. Store listeners push into a channel; the host drains it with
/// [`CoreRuntime::process_pending`] or [`CoreRuntime::next_event`].
pub struct CoreRuntime {
    config: CoreConfig,
    store: Arc<dyn DocumentStore>,
    data_store: Rc<RefCell<AppDataStore>>,
    subscriptions: SubscriptionManager,
    reconciler: ChangeReconciler,
    preferences: PreferencesStorage,
    intents: WriteIntents,
    data_rx: UnboundedReceiver<Delivery>,
    identity: Option<Identity>,
    app_state: AppState,
    notification_callback: Option<NotificationCallback>,
}

impl CoreRuntime {
    pub fn new(config: CoreConfig, store: Arc<dyn DocumentStore>) -> Result<Self> {
        fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("failed to create data dir {}", config.data_dir.display())
        })?;

        let (data_tx, data_rx) = mpsc::unbounded_channel::<Delivery>();
        let subscriptions = SubscriptionManager::new(store.clone(), data_tx);
        let data_store = Rc::new(RefCell::new(AppDataStore::new(config.story_ttl_secs)));
        let preferences = PreferencesStorage::new(&config.data_dir);
        let intents = WriteIntents::new(store.clone(), config.retry.clone());

        info!("runtime: started with data dir {}", config.data_dir.display());
        Ok(Self {
            config,
            store,
            data_store,
            subscriptions,
            reconciler: ChangeReconciler::new(),
            preferences,
            intents,
            data_rx,
            identity: None,
            app_state: AppState::default(),
            notification_callback: None,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    pub fn data_store(&self) -> Rc<RefCell<AppDataStore>> {
        self.data_store.clone()
    }

    pub fn intents(&self) -> WriteIntents {
        self.intents.clone()
    }

    pub fn stats(&self) -> &SnapshotStats {
        self.subscriptions.stats()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The active identity, or [`CoreError::NotSignedIn`].
    pub fn signed_in(&self) -> Result<&Identity, CoreError> {
        self.identity.as_ref().ok_or(CoreError::NotSignedIn)
    }

    pub fn scope(&self) -> &Scope {
        self.subscriptions.scope()
    }

    // ===== Session =====

    /// Switch to a new identity (or sign out with `None`).
    ///
    /// The previous scope is torn down and its cache dropped before anything of
    /// the new scope is opened, so no data crosses tenants.
    pub fn set_identity(
        &mut self,
        identity: Option<Identity>,
    ) -> Result<Vec<CoreEvent>, CoreError> {
        self.subscriptions.teardown();
        self.data_store.borrow_mut().clear();
        self.reconciler.reset();
        self.identity = None;

        let Some(identity) = identity else {
            self.data_store.borrow_mut().set_viewer(None);
            info!("runtime: signed out");
            return Ok(vec![CoreEvent::ScopeChanged(Scope::Empty)]);
        };

        match ScopeResolver::resolve(&identity) {
            Resolution::Terminate => {
                warn!("runtime: identity {} is frozen, ending session", identity.id);
                self.data_store.borrow_mut().set_viewer(None);
                Ok(vec![CoreEvent::SessionTerminated {
                    user_id: identity.id,
                }])
            }
            Resolution::Active(scope) => {
                self.data_store
                    .borrow_mut()
                    .set_viewer(Some(identity.id.clone()));
                self.subscriptions.open(scope.clone(), &identity)?;
                info!("runtime: {} active in scope {}", identity.id, scope);
                self.identity = Some(identity);
                Ok(vec![CoreEvent::ScopeChanged(scope)])
            }
        }
    }

    pub fn app_state(&self) -> AppState {
        self.app_state
    }

    pub fn set_app_state(&mut self, state: AppState) {
        if self.app_state != state {
            debug!("runtime: app state {:?} -> {:?}", self.app_state, state);
            self.app_state = state;
        }
    }

    /// Register the single local-notification callback, replacing any previous one.
    pub fn on_local_notification(&mut self, callback: impl Fn(&LocalNotification) + 'static) {
        self.notification_callback = Some(Box::new(callback));
    }

    pub fn clear_local_notification_callback(&mut self) {
        self.notification_callback = None;
    }

    // ===== Delivery processing =====

    /// Apply every delivery already queued, without waiting.
    pub fn process_pending(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        loop {
            match self.data_rx.try_recv() {
                Ok(delivery) => events.extend(self.process_delivery(delivery)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    /// Wait for the next delivery, then apply it along with anything queued behind it.
    pub async fn next_event(&mut self) -> Option<Vec<CoreEvent>> {
        let delivery = self.data_rx.recv().await?;
        let mut events = self.process_delivery(delivery);
        events.extend(self.process_pending());
        Some(events)
    }

    fn process_delivery(&mut self, delivery: Delivery) -> Vec<CoreEvent> {
        let Some(snapshot) = self.subscriptions.accept(delivery) else {
            return Vec::new();
        };
        let collection = snapshot.collection;
        let documents = self
            .data_store
            .borrow_mut()
            .apply_snapshot(snapshot, unix_now());

        let mut events = vec![CoreEvent::SnapshotApplied {
            collection,
            documents,
        }];

        if collection == Collection::Conversations {
            if let Some(identity) = self.identity.as_ref() {
                let notifications = {
                    let store = self.data_store.borrow();
                    self.reconciler.observe(
                        &store.conversations,
                        &identity.id,
                        self.app_state,
                        &store.users,
                    )
                };
                for notification in notifications {
                    if let Some(callback) = self.notification_callback.as_ref() {
                        callback(&notification);
                    }
                    events.push(CoreEvent::LocalNotification(notification));
                }
            }
        }
        events
    }

    // ===== Derived views =====

    pub fn feed_mode(&self) -> FeedMode {
        self.preferences.feed_mode()
    }

    pub fn set_feed_mode(&mut self, mode: FeedMode) {
        self.preferences.set_feed_mode(mode);
    }

    pub fn current_feed(&self, mode: FeedMode) -> Vec<Post> {
        let Some(identity) = self.identity.as_ref() else {
            return Vec::new();
        };
        let store = self.data_store.borrow();
        let affiliation = store.affiliation(identity);
        let ctx = FeedContext {
            identity,
            affiliation: &affiliation,
            users: &store.users,
        };
        rank_feed(&store.posts, &ctx, mode)
    }

    /// Feed in the persisted mode.
    pub fn current_feed_default(&self) -> Vec<Post> {
        self.current_feed(self.feed_mode())
    }

    pub fn story_entities(&self) -> Vec<StoryEntity> {
        self.story_entities_at(unix_now())
    }

    pub fn story_entities_at(&self, now: u64) -> Vec<StoryEntity> {
        let Some(identity) = self.identity.as_ref() else {
            return Vec::new();
        };
        let store = self.data_store.borrow();
        let affiliation = store.affiliation(identity);
        let ctx = StoryContext {
            identity,
            affiliation: &affiliation,
            users: &store.users,
            groups: &store.groups,
            now,
            ttl_secs: store.story_ttl_secs(),
        };
        aggregate_stories(&store.stories, &ctx)
    }

    pub fn conversations(&self) -> Vec<ConversationSummary> {
        match self.identity.as_ref() {
            Some(identity) => self.data_store.borrow().conversation_summaries(identity),
            None => Vec::new(),
        }
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.data_store.borrow().notices_latest_first()
    }

    pub fn groups(&self) -> Vec<Group> {
        let mut groups: Vec<Group> = self.data_store.borrow().groups.values().cloned().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        groups
    }

    /// Channels of the identity's department, or of every department in a
    /// global scope, by name.
    pub fn department_channels(&self) -> Vec<DepartmentChannel> {
        self.data_store.borrow().department_channels_by_name()
    }

    pub fn courses(&self) -> Vec<Course> {
        self.data_store.borrow().courses.clone()
    }

    pub fn users(&self) -> Vec<UserProfile> {
        let mut users: Vec<UserProfile> =
            self.data_store.borrow().users.values().cloned().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        users
    }

    pub fn shutdown(&mut self) {
        self.subscriptions.teardown();
        self.data_store.borrow_mut().clear();
        self.reconciler.reset();
        self.identity = None;
        info!("runtime: shut down");
    }
}
