//! Operator API routing configuration
//!
//! Routes:
//! - GET    /servers                          - List servers with fetch-status
//! - POST   /servers                          - Register a server
//! - GET    /servers/{id}                     - Server detail
//! - POST   /servers/{id}/refresh             - Poll the agent immediately
//! - DELETE /servers/{id}                     - Remove a server (operator only)
//! - GET    /applications                     - Search instances
//! - GET    /applications/{id}                - Instance detail with tags/mappings/events
//! - PUT    /applications/{id}/update_playbook - Set/clear playbook override
//! - POST   /applications/batch_action        - Start/stop/restart a set of instances
//! - POST   /applications/batch_update        - Rolling update with drain
//! - GET    /applications/{id}/artifacts      - Artifact repository proxy
//! - GET    /tags                             - List tags
//! - POST   /tags/bulk-assign                 - Bulk add/remove tags
//! - GET    /haproxy/instances                - HAProxy processes
//! - GET    /haproxy/instances/{id}/backends  - Backends with member counts
//! - GET    /haproxy/backends/{id}/servers    - Backend members
//! - POST   /haproxy/instances/{id}/sync      - Re-poll one HAProxy host
//! - POST   /haproxy/servers/{id}/map         - Manual mapping
//! - DELETE /haproxy/servers/{id}/map         - Manual unmap (starts sticky window)
//! - GET    /tasks                            - Query tasks
//! - GET    /tasks/{id}                       - Task detail with progress
//! - POST   /tasks/{id}/cancel                - Cooperative cancel
//! - POST   /internal/tasks/{id}/progress     - Runner progress callback
//! - POST   /internal/tasks/{id}/complete     - Runner completion callback

use actix_web::{Scope, web};

use super::{applications, haproxy, internal, servers, tags, tasks};

pub fn server_routes() -> Scope {
    web::scope("/servers")
        .service(servers::list_servers)
        .service(servers::register_server)
        .service(servers::get_server)
        .service(servers::refresh_server)
        .service(servers::delete_server)
}

pub fn application_routes() -> Scope {
    web::scope("/applications")
        .service(applications::search_applications)
        .service(applications::batch_action)
        .service(applications::batch_update)
        .service(applications::get_application)
        .service(applications::update_playbook)
        .service(applications::list_artifacts)
}

pub fn tag_routes() -> Scope {
    web::scope("/tags")
        .service(tags::list_tags)
        .service(tags::bulk_assign)
}

pub fn haproxy_routes() -> Scope {
    web::scope("/haproxy")
        .service(haproxy::list_instances)
        .service(haproxy::list_backends)
        .service(haproxy::list_backend_servers)
        .service(haproxy::sync_instance)
        .service(haproxy::map_server)
        .service(haproxy::unmap_server)
}

pub fn task_routes() -> Scope {
    web::scope("/tasks")
        .service(tasks::list_tasks)
        .service(tasks::get_task)
        .service(tasks::cancel_task)
}

pub fn internal_routes() -> Scope {
    web::scope("/internal")
        .service(internal::post_progress)
        .service(internal::post_complete)
}
