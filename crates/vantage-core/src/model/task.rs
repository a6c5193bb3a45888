// Task kind.

use vantage_api::{ObjectRecord, StatusCategory};

use super::{decode_int, set_field, unknown_method, ObjectInfo, ObjectKind, VantageObject};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskState {
    pub running: Option<bool>,
    /// The task's LED state.
    pub state: Option<i64>,
}

/// A controller task (scripted routine).
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub info: ObjectInfo,
    pub state: TaskState,
}

impl Task {
    pub fn is_running(&self) -> bool {
        self.state.running.unwrap_or(false)
    }
}

impl VantageObject for Task {
    const KIND: ObjectKind = ObjectKind::Task;

    fn wire_types() -> &'static [&'static str] {
        &["Task"]
    }

    fn from_record(record: &ObjectRecord) -> Option<Self> {
        Some(Self {
            info: ObjectInfo::from_record(record),
            state: TaskState::default(),
        })
    }

    fn info(&self) -> &ObjectInfo {
        &self.info
    }

    fn update_config(&mut self, other: &Self) -> bool {
        let changed = self.info != other.info;
        self.info = other.info.clone();
        changed
    }

    fn state_methods() -> &'static [&'static str] {
        &["Task.IsRunning", "Task.GetState"]
    }

    fn status_categories() -> &'static [StatusCategory] {
        &[StatusCategory::Task]
    }

    fn apply_object_status(&mut self, method: &str, result: &str, _args: &[String]) -> bool {
        match method {
            "Task.IsRunning" => set_field(
                &mut self.state.running,
                decode_int(result).map(|v| v != 0),
            ),
            "Task.GetState" => set_field(&mut self.state.state, decode_int(result)),
            _ => unknown_method(Self::KIND, method),
        }
    }

    fn apply_category_status(&mut self, category: &str, args: &[String]) -> bool {
        match (category, args.first()) {
            // S:TASK <vid> <state>
            ("TASK", Some(state)) => set_field(&mut self.state.state, decode_int(state)),
            _ => false,
        }
    }
}
