//! Initial schema: inventory, topology, mappings, tasks, histories, events.
//!
//! Foreign keys cascade on parent delete except where retention demands
//! SET NULL (history tables, task targets). History tables are append-only
//! and indexed by `(entity_id, changed_at)`.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Servers::Table)
                    .if_not_exists()
                    .col(big_integer(Servers::Id).auto_increment().primary_key())
                    .col(string_uniq(Servers::Name))
                    .col(string(Servers::Ip))
                    .col(integer(Servers::AgentPort))
                    .col(string(Servers::Status))
                    .col(date_time_null(Servers::LastCheck))
                    .col(boolean(Servers::IsHaproxyNode))
                    .col(boolean(Servers::IsEurekaNode))
                    .col(string_null(Servers::EurekaUrl))
                    .col(date_time(Servers::CreatedAt))
                    .col(date_time(Servers::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AppCatalog::Table)
                    .if_not_exists()
                    .col(big_integer(AppCatalog::Id).auto_increment().primary_key())
                    .col(string_uniq(AppCatalog::Name))
                    .col(string(AppCatalog::AppType))
                    .col(string_null(AppCatalog::DefaultPlaybook))
                    .col(string_null(AppCatalog::DefaultDistrUrl))
                    .col(string_null(AppCatalog::ArtifactExtension))
                    .col(date_time(AppCatalog::CreatedAt))
                    .col(date_time(AppCatalog::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AppGroups::Table)
                    .if_not_exists()
                    .col(big_integer(AppGroups::Id).auto_increment().primary_key())
                    .col(string_uniq(AppGroups::Name))
                    .col(string_null(AppGroups::DistrUrl))
                    .col(string_null(AppGroups::UpdatePlaybook))
                    .col(string(AppGroups::BatchGrouping))
                    .col(date_time(AppGroups::CreatedAt))
                    .col(date_time(AppGroups::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AppInstances::Table)
                    .if_not_exists()
                    .col(big_integer(AppInstances::Id).auto_increment().primary_key())
                    .col(big_integer(AppInstances::ServerId))
                    .col(string(AppInstances::InstanceName))
                    .col(string(AppInstances::AppType))
                    .col(big_integer_null(AppInstances::CatalogId))
                    .col(big_integer_null(AppInstances::GroupId))
                    .col(string(AppInstances::Status))
                    .col(string_null(AppInstances::Version))
                    .col(big_integer_null(AppInstances::Pid))
                    .col(date_time_null(AppInstances::StartTime))
                    .col(string_null(AppInstances::Ip))
                    .col(integer_null(AppInstances::Port))
                    .col(string_null(AppInstances::AppPath))
                    .col(string_null(AppInstances::LogPath))
                    .col(string_null(AppInstances::ContainerId))
                    .col(string_null(AppInstances::ContainerImage))
                    .col(string_null(AppInstances::ContainerTag))
                    .col(boolean(AppInstances::EurekaRegistered))
                    .col(string_null(AppInstances::EurekaUrl))
                    .col(string_null(AppInstances::CustomPlaybook))
                    .col(string_null(AppInstances::CustomDistrUrl))
                    .col(date_time_null(AppInstances::LastSeen))
                    .col(date_time_null(AppInstances::DeletedAt))
                    .col(date_time(AppInstances::CreatedAt))
                    .col(date_time(AppInstances::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_app_instances_server")
                            .from(AppInstances::Table, AppInstances::ServerId)
                            .to(Servers::Table, Servers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_app_instances_catalog")
                            .from(AppInstances::Table, AppInstances::CatalogId)
                            .to(AppCatalog::Table, AppCatalog::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_app_instances_group")
                            .from(AppInstances::Table, AppInstances::GroupId)
                            .to(AppGroups::Table, AppGroups::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uk_app_instances_identity")
                    .table(AppInstances::Table)
                    .col(AppInstances::ServerId)
                    .col(AppInstances::InstanceName)
                    .col(AppInstances::AppType)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tags::Table)
                    .if_not_exists()
                    .col(big_integer(Tags::Id).auto_increment().primary_key())
                    .col(string_uniq(Tags::Name))
                    .col(boolean(Tags::IsSystem))
                    .col(date_time(Tags::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InstanceTags::Table)
                    .if_not_exists()
                    .col(big_integer(InstanceTags::Id).auto_increment().primary_key())
                    .col(big_integer(InstanceTags::InstanceId))
                    .col(big_integer(InstanceTags::TagId))
                    .col(date_time(InstanceTags::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_instance_tags_instance")
                            .from(InstanceTags::Table, InstanceTags::InstanceId)
                            .to(AppInstances::Table, AppInstances::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_instance_tags_tag")
                            .from(InstanceTags::Table, InstanceTags::TagId)
                            .to(Tags::Table, Tags::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uk_instance_tags_pair")
                    .table(InstanceTags::Table)
                    .col(InstanceTags::InstanceId)
                    .col(InstanceTags::TagId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GroupTags::Table)
                    .if_not_exists()
                    .col(big_integer(GroupTags::Id).auto_increment().primary_key())
                    .col(big_integer(GroupTags::GroupId))
                    .col(big_integer(GroupTags::TagId))
                    .col(date_time(GroupTags::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_tags_group")
                            .from(GroupTags::Table, GroupTags::GroupId)
                            .to(AppGroups::Table, AppGroups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_tags_tag")
                            .from(GroupTags::Table, GroupTags::TagId)
                            .to(Tags::Table, Tags::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uk_group_tags_pair")
                    .table(GroupTags::Table)
                    .col(GroupTags::GroupId)
                    .col(GroupTags::TagId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(HaproxyInstances::Table)
                    .if_not_exists()
                    .col(
                        big_integer(HaproxyInstances::Id)
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(HaproxyInstances::ServerId))
                    .col(string(HaproxyInstances::Name))
                    .col(date_time_null(HaproxyInstances::LastSeen))
                    .col(date_time_null(HaproxyInstances::RemovedAt))
                    .col(date_time(HaproxyInstances::CreatedAt))
                    .col(date_time(HaproxyInstances::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_haproxy_instances_server")
                            .from(HaproxyInstances::Table, HaproxyInstances::ServerId)
                            .to(Servers::Table, Servers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uk_haproxy_instances_identity")
                    .table(HaproxyInstances::Table)
                    .col(HaproxyInstances::ServerId)
                    .col(HaproxyInstances::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(HaproxyBackends::Table)
                    .if_not_exists()
                    .col(
                        big_integer(HaproxyBackends::Id)
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(HaproxyBackends::HaproxyInstanceId))
                    .col(string(HaproxyBackends::Name))
                    .col(date_time_null(HaproxyBackends::LastSeen))
                    .col(date_time_null(HaproxyBackends::RemovedAt))
                    .col(date_time(HaproxyBackends::CreatedAt))
                    .col(date_time(HaproxyBackends::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_haproxy_backends_instance")
                            .from(HaproxyBackends::Table, HaproxyBackends::HaproxyInstanceId)
                            .to(HaproxyInstances::Table, HaproxyInstances::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uk_haproxy_backends_identity")
                    .table(HaproxyBackends::Table)
                    .col(HaproxyBackends::HaproxyInstanceId)
                    .col(HaproxyBackends::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(HaproxyServers::Table)
                    .if_not_exists()
                    .col(
                        big_integer(HaproxyServers::Id)
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(HaproxyServers::BackendId))
                    .col(string(HaproxyServers::Name))
                    .col(string_null(HaproxyServers::Ip))
                    .col(integer_null(HaproxyServers::Port))
                    .col(string(HaproxyServers::Status))
                    .col(integer_null(HaproxyServers::Weight))
                    .col(big_integer_null(HaproxyServers::CurrentSessions))
                    .col(big_integer_null(HaproxyServers::MaxSessions))
                    .col(big_integer_null(HaproxyServers::LastStateChangeSeconds))
                    .col(date_time_null(HaproxyServers::LastSeen))
                    .col(date_time_null(HaproxyServers::RemovedAt))
                    .col(date_time(HaproxyServers::CreatedAt))
                    .col(date_time(HaproxyServers::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_haproxy_servers_backend")
                            .from(HaproxyServers::Table, HaproxyServers::BackendId)
                            .to(HaproxyBackends::Table, HaproxyBackends::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uk_haproxy_servers_identity")
                    .table(HaproxyServers::Table)
                    .col(HaproxyServers::BackendId)
                    .col(HaproxyServers::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EurekaServers::Table)
                    .if_not_exists()
                    .col(big_integer(EurekaServers::Id).auto_increment().primary_key())
                    .col(big_integer_null(EurekaServers::ServerId))
                    .col(string_uniq(EurekaServers::Url))
                    .col(date_time_null(EurekaServers::LastSeen))
                    .col(date_time_null(EurekaServers::RemovedAt))
                    .col(date_time(EurekaServers::CreatedAt))
                    .col(date_time(EurekaServers::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_eureka_servers_server")
                            .from(EurekaServers::Table, EurekaServers::ServerId)
                            .to(Servers::Table, Servers::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EurekaApplications::Table)
                    .if_not_exists()
                    .col(
                        big_integer(EurekaApplications::Id)
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(EurekaApplications::EurekaServerId))
                    .col(string(EurekaApplications::Name))
                    .col(date_time_null(EurekaApplications::LastSeen))
                    .col(date_time_null(EurekaApplications::RemovedAt))
                    .col(date_time(EurekaApplications::CreatedAt))
                    .col(date_time(EurekaApplications::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_eureka_applications_server")
                            .from(
                                EurekaApplications::Table,
                                EurekaApplications::EurekaServerId,
                            )
                            .to(EurekaServers::Table, EurekaServers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uk_eureka_applications_identity")
                    .table(EurekaApplications::Table)
                    .col(EurekaApplications::EurekaServerId)
                    .col(EurekaApplications::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EurekaInstances::Table)
                    .if_not_exists()
                    .col(
                        big_integer(EurekaInstances::Id)
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(EurekaInstances::EurekaApplicationId))
                    .col(string(EurekaInstances::InstanceId))
                    .col(string_null(EurekaInstances::Hostname))
                    .col(string(EurekaInstances::Ip))
                    .col(integer_null(EurekaInstances::Port))
                    .col(string(EurekaInstances::Status))
                    .col(date_time_null(EurekaInstances::LastHeartbeat))
                    .col(text_null(EurekaInstances::Metadata))
                    .col(date_time_null(EurekaInstances::LastSeen))
                    .col(date_time_null(EurekaInstances::RemovedAt))
                    .col(date_time(EurekaInstances::CreatedAt))
                    .col(date_time(EurekaInstances::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_eureka_instances_application")
                            .from(
                                EurekaInstances::Table,
                                EurekaInstances::EurekaApplicationId,
                            )
                            .to(EurekaApplications::Table, EurekaApplications::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uk_eureka_instances_identity")
                    .table(EurekaInstances::Table)
                    .col(EurekaInstances::EurekaApplicationId)
                    .col(EurekaInstances::InstanceId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AppMappings::Table)
                    .if_not_exists()
                    .col(big_integer(AppMappings::Id).auto_increment().primary_key())
                    .col(big_integer(AppMappings::ApplicationId))
                    .col(string(AppMappings::EntityType))
                    .col(big_integer(AppMappings::EntityId))
                    .col(boolean(AppMappings::IsManual))
                    .col(string_null(AppMappings::MappedBy))
                    .col(string_null(AppMappings::Notes))
                    .col(date_time(AppMappings::CreatedAt))
                    .col(date_time(AppMappings::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_app_mappings_application")
                            .from(AppMappings::Table, AppMappings::ApplicationId)
                            .to(AppInstances::Table, AppInstances::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uk_app_mappings_identity")
                    .table(AppMappings::Table)
                    .col(AppMappings::ApplicationId)
                    .col(AppMappings::EntityType)
                    .col(AppMappings::EntityId)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uk_app_mappings_entity")
                    .table(AppMappings::Table)
                    .col(AppMappings::EntityType)
                    .col(AppMappings::EntityId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(big_integer(Tasks::Id).auto_increment().primary_key())
                    .col(string(Tasks::TaskType))
                    .col(string(Tasks::Status))
                    .col(text(Tasks::Params))
                    .col(big_integer_null(Tasks::ServerId))
                    .col(big_integer_null(Tasks::InstanceId))
                    .col(string_null(Tasks::IdempotencyKey))
                    .col(date_time(Tasks::CreatedAt))
                    .col(date_time_null(Tasks::StartedAt))
                    .col(date_time_null(Tasks::CompletedAt))
                    .col(text_null(Tasks::Result))
                    .col(text_null(Tasks::Error))
                    .col(text_null(Tasks::Progress))
                    .col(big_integer_null(Tasks::RunnerPid))
                    .col(boolean(Tasks::Cancelled))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_server")
                            .from(Tasks::Table, Tasks::ServerId)
                            .to(Servers::Table, Servers::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_instance")
                            .from(Tasks::Table, Tasks::InstanceId)
                            .to(AppInstances::Table, AppInstances::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_tasks_status_created")
                    .table(Tasks::Table)
                    .col(Tasks::Status)
                    .col(Tasks::CreatedAt)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_tasks_idempotency_key")
                    .table(Tasks::Table)
                    .col(Tasks::IdempotencyKey)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(VersionHistory::Table)
                    .if_not_exists()
                    .col(
                        big_integer(VersionHistory::Id)
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer_null(VersionHistory::InstanceId))
                    .col(string_null(VersionHistory::OldVersion))
                    .col(string_null(VersionHistory::NewVersion))
                    .col(string_null(VersionHistory::ChangedBy))
                    .col(string_null(VersionHistory::Reason))
                    .col(date_time(VersionHistory::ChangedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_version_history_instance")
                            .from(VersionHistory::Table, VersionHistory::InstanceId)
                            .to(AppInstances::Table, AppInstances::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_version_history_instance_changed")
                    .table(VersionHistory::Table)
                    .col(VersionHistory::InstanceId)
                    .col(VersionHistory::ChangedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TagHistory::Table)
                    .if_not_exists()
                    .col(big_integer(TagHistory::Id).auto_increment().primary_key())
                    .col(big_integer_null(TagHistory::InstanceId))
                    .col(string(TagHistory::TagName))
                    .col(string(TagHistory::Action))
                    .col(string_null(TagHistory::Actor))
                    .col(date_time(TagHistory::ChangedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tag_history_instance")
                            .from(TagHistory::Table, TagHistory::InstanceId)
                            .to(AppInstances::Table, AppInstances::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_tag_history_instance_changed")
                    .table(TagHistory::Table)
                    .col(TagHistory::InstanceId)
                    .col(TagHistory::ChangedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(HaproxyStatusHistory::Table)
                    .if_not_exists()
                    .col(
                        big_integer(HaproxyStatusHistory::Id)
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer_null(HaproxyStatusHistory::HaproxyServerId))
                    .col(string_null(HaproxyStatusHistory::OldStatus))
                    .col(string(HaproxyStatusHistory::NewStatus))
                    .col(date_time(HaproxyStatusHistory::ChangedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_haproxy_status_history_server")
                            .from(
                                HaproxyStatusHistory::Table,
                                HaproxyStatusHistory::HaproxyServerId,
                            )
                            .to(HaproxyServers::Table, HaproxyServers::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_haproxy_status_history_server_changed")
                    .table(HaproxyStatusHistory::Table)
                    .col(HaproxyStatusHistory::HaproxyServerId)
                    .col(HaproxyStatusHistory::ChangedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EurekaStatusHistory::Table)
                    .if_not_exists()
                    .col(
                        big_integer(EurekaStatusHistory::Id)
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer_null(EurekaStatusHistory::EurekaInstanceId))
                    .col(string_null(EurekaStatusHistory::OldStatus))
                    .col(string(EurekaStatusHistory::NewStatus))
                    .col(date_time(EurekaStatusHistory::ChangedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_eureka_status_history_instance")
                            .from(
                                EurekaStatusHistory::Table,
                                EurekaStatusHistory::EurekaInstanceId,
                            )
                            .to(EurekaInstances::Table, EurekaInstances::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_eureka_status_history_instance_changed")
                    .table(EurekaStatusHistory::Table)
                    .col(EurekaStatusHistory::EurekaInstanceId)
                    .col(EurekaStatusHistory::ChangedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MappingHistory::Table)
                    .if_not_exists()
                    .col(
                        big_integer(MappingHistory::Id)
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer_null(MappingHistory::ApplicationId))
                    .col(string(MappingHistory::EntityType))
                    .col(big_integer(MappingHistory::EntityId))
                    .col(string(MappingHistory::Action))
                    .col(string(MappingHistory::Reason))
                    .col(string_null(MappingHistory::Actor))
                    .col(string_null(MappingHistory::Notes))
                    .col(date_time(MappingHistory::ChangedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_mapping_history_application")
                            .from(MappingHistory::Table, MappingHistory::ApplicationId)
                            .to(AppInstances::Table, AppInstances::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_mapping_history_entity_changed")
                    .table(MappingHistory::Table)
                    .col(MappingHistory::EntityId)
                    .col(MappingHistory::ChangedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Events::Table)
                    .if_not_exists()
                    .col(big_integer(Events::Id).auto_increment().primary_key())
                    .col(big_integer(Events::InstanceId))
                    .col(string(Events::EventType))
                    .col(text_null(Events::Message))
                    .col(date_time(Events::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_events_instance")
                            .from(Events::Table, Events::InstanceId)
                            .to(AppInstances::Table, AppInstances::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_events_instance_id")
                    .table(Events::Table)
                    .col(Events::InstanceId)
                    .col(Events::Id)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            Events::Table.into_iden(),
            MappingHistory::Table.into_iden(),
            EurekaStatusHistory::Table.into_iden(),
            HaproxyStatusHistory::Table.into_iden(),
            TagHistory::Table.into_iden(),
            VersionHistory::Table.into_iden(),
            Tasks::Table.into_iden(),
            AppMappings::Table.into_iden(),
            EurekaInstances::Table.into_iden(),
            EurekaApplications::Table.into_iden(),
            EurekaServers::Table.into_iden(),
            HaproxyServers::Table.into_iden(),
            HaproxyBackends::Table.into_iden(),
            HaproxyInstances::Table.into_iden(),
            GroupTags::Table.into_iden(),
            InstanceTags::Table.into_iden(),
            Tags::Table.into_iden(),
            AppInstances::Table.into_iden(),
            AppGroups::Table.into_iden(),
            AppCatalog::Table.into_iden(),
            Servers::Table.into_iden(),
        ] {
            manager
                .drop_table(Table::drop().table(table).to_owned())
                .await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Servers {
    Table,
    Id,
    Name,
    Ip,
    AgentPort,
    Status,
    LastCheck,
    IsHaproxyNode,
    IsEurekaNode,
    EurekaUrl,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum AppCatalog {
    Table,
    Id,
    Name,
    AppType,
    DefaultPlaybook,
    DefaultDistrUrl,
    ArtifactExtension,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum AppGroups {
    Table,
    Id,
    Name,
    DistrUrl,
    UpdatePlaybook,
    BatchGrouping,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum AppInstances {
    Table,
    Id,
    ServerId,
    InstanceName,
    AppType,
    CatalogId,
    GroupId,
    Status,
    Version,
    Pid,
    StartTime,
    Ip,
    Port,
    AppPath,
    LogPath,
    ContainerId,
    ContainerImage,
    ContainerTag,
    EurekaRegistered,
    EurekaUrl,
    CustomPlaybook,
    CustomDistrUrl,
    LastSeen,
    DeletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Tags {
    Table,
    Id,
    Name,
    IsSystem,
    CreatedAt,
}

#[derive(DeriveIden)]
enum InstanceTags {
    Table,
    Id,
    InstanceId,
    TagId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum GroupTags {
    Table,
    Id,
    GroupId,
    TagId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum HaproxyInstances {
    Table,
    Id,
    ServerId,
    Name,
    LastSeen,
    RemovedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum HaproxyBackends {
    Table,
    Id,
    HaproxyInstanceId,
    Name,
    LastSeen,
    RemovedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum HaproxyServers {
    Table,
    Id,
    BackendId,
    Name,
    Ip,
    Port,
    Status,
    Weight,
    CurrentSessions,
    MaxSessions,
    LastStateChangeSeconds,
    LastSeen,
    RemovedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EurekaServers {
    Table,
    Id,
    ServerId,
    Url,
    LastSeen,
    RemovedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EurekaApplications {
    Table,
    Id,
    EurekaServerId,
    Name,
    LastSeen,
    RemovedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EurekaInstances {
    Table,
    Id,
    EurekaApplicationId,
    InstanceId,
    Hostname,
    Ip,
    Port,
    Status,
    LastHeartbeat,
    Metadata,
    LastSeen,
    RemovedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum AppMappings {
    Table,
    Id,
    ApplicationId,
    EntityType,
    EntityId,
    IsManual,
    MappedBy,
    Notes,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Tasks {
    Table,
    Id,
    TaskType,
    Status,
    Params,
    ServerId,
    InstanceId,
    IdempotencyKey,
    CreatedAt,
    StartedAt,
    CompletedAt,
    Result,
    Error,
    Progress,
    RunnerPid,
    Cancelled,
}

#[derive(DeriveIden)]
enum VersionHistory {
    Table,
    Id,
    InstanceId,
    OldVersion,
    NewVersion,
    ChangedBy,
    Reason,
    ChangedAt,
}

#[derive(DeriveIden)]
enum TagHistory {
    Table,
    Id,
    InstanceId,
    TagName,
    Action,
    Actor,
    ChangedAt,
}

#[derive(DeriveIden)]
enum HaproxyStatusHistory {
    Table,
    Id,
    HaproxyServerId,
    OldStatus,
    NewStatus,
    ChangedAt,
}

#[derive(DeriveIden)]
enum EurekaStatusHistory {
    Table,
    Id,
    EurekaInstanceId,
    OldStatus,
    NewStatus,
    ChangedAt,
}

#[derive(DeriveIden)]
enum MappingHistory {
    Table,
    Id,
    ApplicationId,
    EntityType,
    EntityId,
    Action,
    Reason,
    Actor,
    Notes,
    ChangedAt,
}

#[derive(DeriveIden)]
enum Events {
    Table,
    Id,
    InstanceId,
    EventType,
    Message,
    CreatedAt,
}
