use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;
use sea_orm_migration::schema::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Tasks {
    Table,
    Id,
    Title,
    Description,
    Status,
    Priority,
    DueDate,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
struct TaskStatus;

#[derive(DeriveIden)]
struct TaskPriority;

// Declaration order is the sort order Postgres uses for enum columns.
const TASK_STATUS_VALUES: [&str; 2] = ["PENDING", "COMPLETED"];
const TASK_PRIORITY_VALUES: [&str; 3] = ["LOW", "MEDIUM", "HIGH"];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(TaskStatus)
                    .values(TASK_STATUS_VALUES.map(Alias::new))
                    .to_owned(),
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(TaskPriority)
                    .values(TASK_PRIORITY_VALUES.map(Alias::new))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tasks::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string_len(Tasks::Title, 255))
                    .col(text_null(Tasks::Description))
                    .col(
                        enumeration(
                            Tasks::Status,
                            TaskStatus,
                            TASK_STATUS_VALUES.map(Alias::new),
                        )
                        .default("PENDING"),
                    )
                    .col(
                        enumeration(
                            Tasks::Priority,
                            TaskPriority,
                            TASK_PRIORITY_VALUES.map(Alias::new),
                        )
                        .default("MEDIUM"),
                    )
                    .col(date_null(Tasks::DueDate))
                    .col(
                        timestamp_with_time_zone(Tasks::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Tasks::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(TaskPriority).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(TaskStatus).to_owned())
            .await
    }
}
