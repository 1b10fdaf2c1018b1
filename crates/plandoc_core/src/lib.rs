pub mod buffer;
pub mod builder;
pub mod config;
pub mod document;
pub mod plan;
pub mod schema;
pub mod testutil;
pub mod verifier;
pub mod view;

pub use builder::{PlanBuilder, WIPOffset};
pub use config::{DecodeOptions, VerifierOptions, VersionPolicy};
pub use document::PlanDocument;
pub use plan::{PlanMap, PlanOpCodec, SqlPlan, decode_plan, encode_plan};
pub use schema::{SqlPlanArgs, create_plan_map, create_sql_plan};
pub use verifier::{verify_sql_plan, verify_sql_plan_with};
pub use view::{
    PlanMapView,
    PlanOpView,
    SqlPlanView,
    TableView,
    root_as_sql_plan,
    root_as_sql_plan_verified,
};
