//! Lambda-only automations (`set_action`, `on_connect`, ...)

use serde::Deserialize;

use crate::codegen::{CodeGen, Expr};
use crate::types::Lambda;

/// One action of an automation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Action {
    /// Body run when the trigger fires
    pub lambda: Lambda,
}

/// Wire `actions` to `trigger`
///
/// `template_args` are the trigger's argument types (`float`,
/// `StringRef`, or empty), `params` the lambda parameter list that matches
/// them.
pub fn emit_automation(
    cg: &mut CodeGen,
    trigger: Expr,
    template_args: &str,
    params: &str,
    actions: &[Action],
) {
    if actions.is_empty() {
        return;
    }
    let automation = cg.unique_id("automation");
    cg.new_pvariable(&automation, &format!("Automation<{template_args}>"), vec![trigger]);

    let mut action_vars = Vec::with_capacity(actions.len());
    for action in actions {
        let id = cg.unique_id("lambdaaction");
        cg.new_pvariable(
            &id,
            &format!("LambdaAction<{template_args}>"),
            vec![Expr::raw(action.lambda.render(params, None))],
        );
        action_vars.push(Expr::var(id));
    }
    cg.call(&automation, "add_actions", vec![Expr::List(action_vars)]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;
    use crate::validation::ValidationReport;

    #[test]
    fn actions_are_chained() {
        let mut cg = CodeGen::new(Platform::Esp8266, Default::default());
        let actions = vec![
            Action { lambda: Lambda("id(a) = x;".into()) },
            Action { lambda: Lambda("id(b) = x;".into()) },
        ];
        emit_automation(&mut cg, Expr::raw("level->get_set_trigger()"), "float", "float x", &actions);
        let program = cg.finish("dev", ValidationReport::new());
        let main = program.main_cpp();
        assert!(main.contains("automation_id = new Automation<float>(level->get_set_trigger());"));
        assert!(main.contains("lambdaaction_id = new LambdaAction<float>([=](float x) -> void {"));
        assert!(main.contains("automation_id->add_actions({lambdaaction_id, lambdaaction_id_2});"));
    }

    #[test]
    fn nothing_without_actions() {
        let mut cg = CodeGen::new(Platform::Esp8266, Default::default());
        emit_automation(&mut cg, Expr::raw("t"), "", "", &[]);
        assert!(!cg.is_declared("automation_id"));
    }
}
