//! Per-entity services.
//!
//! Each service holds a clone of the [`Database`] handle plus the config
//! it needs, and enforces ownership and visibility rules on top of the
//! repositories.

pub mod admin;
pub mod base;
pub mod comments;
pub mod forms;
pub mod likes;
pub mod responses;
pub mod results;
pub mod search;
pub mod templates;
pub mod topics;
pub mod users;

pub use admin::AdminService;
pub use base::Actor;
pub use comments::CommentService;
pub use forms::FormService;
pub use likes::LikeService;
pub use responses::ResponseService;
pub use search::SearchService;
pub use templates::TemplateService;
pub use topics::TopicService;
pub use users::UserService;

use crate::config::Config;
use crate::db::Database;
use crate::db::retry::RetryPolicy;

/// All services, wired to one database.
#[derive(Clone)]
pub struct Services {
    pub users: UserService,
    pub templates: TemplateService,
    pub forms: FormService,
    pub responses: ResponseService,
    pub comments: CommentService,
    pub likes: LikeService,
    pub topics: TopicService,
    pub search: SearchService,
    pub admin: AdminService,
}

impl Services {
    pub fn new(db: Database, config: &Config) -> Self {
        let retry = RetryPolicy::from(&config.retry);
        Self {
            users: UserService::new(db.clone(), &config.auth, retry),
            templates: TemplateService::new(db.clone(), config.limits.clone()),
            responses: ResponseService::new(db.clone(), retry),
            forms: FormService::new(db.clone()),
            comments: CommentService::new(db.clone(), config.limits.max_comment_length),
            likes: LikeService::new(db.clone()),
            topics: TopicService::new(db.clone()),
            search: SearchService::new(db.clone(), config.limits.clone()),
            admin: AdminService::new(db, config.limits.clone()),
        }
    }
}
