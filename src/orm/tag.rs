//! SeaORM entity for the tag table.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tag")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::thread_tag::Entity")]
    ThreadTag,
}

impl Related<super::thread_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ThreadTag.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
