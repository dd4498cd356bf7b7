//! Concrete column schemas

use super::{ColumnSchema, Field};

/// Raw simulator output columns
pub struct SimoutSchema;

impl SimoutSchema {
    pub const TIME: &'static str = "simout1";
    pub const EGO_A: &'static str = "simout2";
    pub const EGO_V: &'static str = "simout3";
    pub const EGO_X: &'static str = "simout4";
    pub const EGO_Y: &'static str = "simout5";
    pub const PSI: &'static str = "simout6";
    pub const GAS_OUT: &'static str = "simout7";
    pub const BRAKE_OUT: &'static str = "simout8";
}

impl ColumnSchema for SimoutSchema {
    const NAME: &'static str = "simout";
    const FIELDS: &'static [Field] = &[
        Field::new("time", Self::TIME),
        Field::new("ego_a", Self::EGO_A),
        Field::new("ego_v", Self::EGO_V),
        Field::new("ego_x", Self::EGO_X),
        Field::new("ego_y", Self::EGO_Y),
        Field::new("psi", Self::PSI),
        Field::new("Gas_Out", Self::GAS_OUT),
        Field::new("Brake_Out", Self::BRAKE_OUT),
    ];
}

/// Per-sample columns derived during trial processing
pub struct ProcessedSchema;

impl ProcessedSchema {
    pub const EGO_FRONT_LEFT_X: &'static str = "Ego_front_left_x";
    pub const EGO_FRONT_LEFT_Y: &'static str = "Ego_front_left_y";
    pub const VELOCITY_TIMES_DT: &'static str = "Velocity_times_dt";
    pub const BRAKE_OUT_TIMES_DT: &'static str = "Brake_Out_times_dt";
    pub const GAS_OUT_TIMES_DT: &'static str = "Gas_Out_times_dt";
}

impl ColumnSchema for ProcessedSchema {
    const NAME: &'static str = "processed";
    const FIELDS: &'static [Field] = &[
        Field::new("Ego_front_left_x", Self::EGO_FRONT_LEFT_X),
        Field::new("Ego_front_left_y", Self::EGO_FRONT_LEFT_Y),
        Field::new("Velocity_times_dt", Self::VELOCITY_TIMES_DT),
        Field::new("Brake_Out_times_dt", Self::BRAKE_OUT_TIMES_DT),
        Field::new("Gas_Out_times_dt", Self::GAS_OUT_TIMES_DT),
    ];
}

/// Per-trial result row columns, in output order
pub struct ResultSchema;

impl ResultSchema {
    pub const SIMOUT_FILE: &'static str = "simout_file";
    pub const EXPERIMENT_CONDITION: &'static str = "experiment_condition";
    pub const AVERAGE_VELOCITY: &'static str = "average_velocity";
    pub const TOTAL_MILEAGE: &'static str = "total_mileage";
    pub const BRAKE_OUT_SUM: &'static str = "Brake_Out_sum";
    pub const GAS_OUT_SUM: &'static str = "Gas_Out_sum";
    pub const EXPERIMENT_NUMBER: &'static str = "experiment_number";
    pub const SUBJECT_ID: &'static str = "subject_id";
    pub const EXPERIMENT_DATE: &'static str = "experiment_date";
}

impl ColumnSchema for ResultSchema {
    const NAME: &'static str = "result";
    const FIELDS: &'static [Field] = &[
        Field::new("simout_file", Self::SIMOUT_FILE),
        Field::new("experiment_condition", Self::EXPERIMENT_CONDITION),
        Field::new("average_velocity", Self::AVERAGE_VELOCITY),
        Field::new("total_mileage", Self::TOTAL_MILEAGE),
        Field::new("Brake_Out_sum", Self::BRAKE_OUT_SUM),
        Field::new("Gas_Out_sum", Self::GAS_OUT_SUM),
        Field::new("experiment_number", Self::EXPERIMENT_NUMBER),
        Field::new("subject_id", Self::SUBJECT_ID),
        Field::new("experiment_date", Self::EXPERIMENT_DATE),
    ];
}

/// Subject master roster columns
pub struct RosterSchema;

impl RosterSchema {
    pub const SUBJECT_ID: &'static str = "subject_id";
    pub const SUBJECT_NAME: &'static str = "subject_name";
    pub const EXPERIMENT_DATE: &'static str = "experiment_date";
    pub const FILE_NAME_60: &'static str = "file_name_60";
    pub const FILE_NAME_50: &'static str = "file_name_50";
    pub const FILE_NAME_40: &'static str = "file_name_40";
    pub const EXPERIMENT_CONDITION: &'static str = "experiment_condition";
    pub const EXPERIMENT_1: &'static str = "experiment_1";
    pub const EXPERIMENT_2: &'static str = "experiment_2";
    pub const EXPERIMENT_3: &'static str = "experiment_3";
}

impl ColumnSchema for RosterSchema {
    const NAME: &'static str = "roster";
    const FIELDS: &'static [Field] = &[
        Field::new("subject_id", Self::SUBJECT_ID),
        Field::new("subject_name", Self::SUBJECT_NAME),
        Field::new("experiment_date", Self::EXPERIMENT_DATE),
        Field::new("file_name_60", Self::FILE_NAME_60),
        Field::new("file_name_50", Self::FILE_NAME_50),
        Field::new("file_name_40", Self::FILE_NAME_40),
        Field::new("experiment_condition", Self::EXPERIMENT_CONDITION),
        Field::new("experiment_1", Self::EXPERIMENT_1),
        Field::new("experiment_2", Self::EXPERIMENT_2),
        Field::new("experiment_3", Self::EXPERIMENT_3),
    ];
}
