use std::time::Duration;

use super::node::DumpKind;
use super::PipelineContext;
use crate::events::RotationEvent;
use crate::executor::TaskType;

impl PipelineContext {
    /// Runs a diagnostics command, returning the lines to print.
    ///
    /// `params[0]` selects the command, the rest are its arguments. Malformed arguments
    /// are logged and the command does nothing.
    pub fn dump<S: AsRef<str>>(&mut self, params: &[S]) -> Vec<String> {
        let mut out = Vec::new();
        let Some(command) = params.first() else {
            log::warn!("dump called without params");
            return out;
        };
        let args: Vec<&str> = params[1..].iter().map(AsRef::as_ref).collect();

        match command.as_ref() {
            "-element" => self.dump_tree(DumpKind::Element, &mut out),
            "-render" => self.dump_tree(DumpKind::Render, &mut out),
            "-focus" => self.dump_tree(DumpKind::Focus, &mut out),
            "-layer" => self.dump_tree(DumpKind::Layer, &mut out),
            "-accessibility" => self.dump_accessibility(&args, &mut out),
            "-rotation" => self.dump_rotation(&args, &mut out),
            "-animationscale" => self.dump_animation_scale(&args, &mut out),
            "-threadstuck" => self.dump_thread_stuck(&args, &mut out),
            other => {
                log::debug!("unsupported dump command {}", other);
                out.push("Error: Unsupported dump params!".to_string());
            }
        }
        out
    }

    fn dump_tree(&self, kind: DumpKind, out: &mut Vec<String>) {
        match &self.root() {
            Some(root) => root.dump(kind, out),
            None => log::warn!("nothing to dump, root element is missing"),
        }
    }

    fn dump_accessibility(&self, args: &[&str], out: &mut Vec<String>) {
        let Some(manager) = self.accessibility_manager() else {
            log::warn!("no accessibility manager to dump");
            return;
        };

        match args {
            [] => manager.dump_tree(out),
            [id] => match id.parse::<i64>() {
                Ok(id) => manager.dump_property(id, out),
                Err(e) => log::warn!("invalid accessibility node id '{}': {}", id, e),
            },
            [id, action, ..] => match (id.parse::<i64>(), action.parse::<i32>()) {
                (Ok(id), Ok(action)) => manager.dump_handle_event(id, action, out),
                _ => log::warn!("invalid accessibility params '{} {}'", id, action),
            },
        }
    }

    fn dump_rotation(&mut self, args: &[&str], out: &mut Vec<String>) {
        let Some(value) = args.first().and_then(|v| v.parse::<i32>().ok()) else {
            log::warn!("invalid rotation params {:?}", args);
            return;
        };
        out.push("Dump rotation".to_string());
        self.on_rotation_event(&RotationEvent { value: f64::from(value) });
    }

    fn dump_animation_scale(&mut self, args: &[&str], out: &mut Vec<String>) {
        let Some(scale) = args.first().and_then(|v| v.parse::<f64>().ok()) else {
            log::warn!("invalid animation scale params {:?}", args);
            return;
        };
        out.push(format!("Set Animation Scale. scale: {}", scale));
        self.set_animation_scale(scale);
    }

    fn dump_thread_stuck(&self, args: &[&str], out: &mut Vec<String>) {
        let target = match args.first() {
            Some(&"JS") => Some(TaskType::Js),
            Some(&"UI") => Some(TaskType::Ui),
            _ => None,
        };
        let seconds = args.get(1).and_then(|v| v.parse::<i64>().ok()).filter(|s| *s >= 0);

        let (Some(task_type), Some(seconds)) = (target, seconds) else {
            out.push("Params illegal, please check!".to_string());
            return;
        };

        out.push(format!("{} thread will stuck for {} seconds.", args[0], seconds));
        let stall = Duration::from_secs(seconds.unsigned_abs());
        self.executor().post_task(Box::new(move || std::thread::sleep(stall)), task_type);
    }
}
