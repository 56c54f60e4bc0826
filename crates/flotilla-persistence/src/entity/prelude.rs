//! Re-exports of all entity types

pub use super::app_catalog::Entity as AppCatalog;
pub use super::app_group::Entity as AppGroup;
pub use super::app_instance::Entity as AppInstance;
pub use super::app_mapping::Entity as AppMapping;
pub use super::eureka_application::Entity as EurekaApplication;
pub use super::eureka_instance::Entity as EurekaInstance;
pub use super::eureka_server::Entity as EurekaServer;
pub use super::eureka_status_history::Entity as EurekaStatusHistory;
pub use super::event::Entity as Event;
pub use super::group_tag::Entity as GroupTag;
pub use super::haproxy_backend::Entity as HaproxyBackend;
pub use super::haproxy_instance::Entity as HaproxyInstance;
pub use super::haproxy_server::Entity as HaproxyServer;
pub use super::haproxy_status_history::Entity as HaproxyStatusHistory;
pub use super::instance_tag::Entity as InstanceTag;
pub use super::mapping_history::Entity as MappingHistory;
pub use super::server::Entity as Server;
pub use super::tag::Entity as Tag;
pub use super::tag_history::Entity as TagHistory;
pub use super::task::Entity as Task;
pub use super::version_history::Entity as VersionHistory;
