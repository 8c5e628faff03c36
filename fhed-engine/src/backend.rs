use tracing::debug;

use crate::errors::EngineError;

/// 求解器选项，只输出已设置的项。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverOptions {
    pub solver: Option<String>,
    pub matvec: Option<String>,
    pub precond: Option<String>,
    pub order: Option<u32>,
    pub tol: Option<f64>,
    pub maxiters: Option<u32>,
}

impl SolverOptions {
    /// 转换为命令行参数，顺序固定为 `-s -m -p -o -t -c`。
    pub fn to_args(&self) -> Vec<String> {
        let text_flags = [
            ("-s", self.solver.as_deref()),
            ("-m", self.matvec.as_deref()),
            ("-p", self.precond.as_deref()),
        ];
        let mut args = Vec::new();
        for (flag, value) in text_flags {
            if let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) {
                args.push(flag.to_string());
                args.push(value.to_string());
            }
        }
        if let Some(order) = self.order {
            args.push("-o".to_string());
            args.push(order.to_string());
        }
        if let Some(tol) = self.tol {
            args.push("-t".to_string());
            args.push(tol.to_string());
        }
        if let Some(maxiters) = self.maxiters {
            args.push("-c".to_string());
            args.push(maxiters.to_string());
        }
        args
    }
}

/// 提交给执行后端的请求：序列化后的文档与求解器选项。
#[derive(Debug, Clone, PartialEq)]
pub struct SolverRequest {
    pub document: String,
    pub options: SolverOptions,
}

impl SolverRequest {
    #[inline]
    pub fn args(&self) -> Vec<String> {
        self.options.to_args()
    }
}

/// 执行后端返回的结果。
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// `Zc.mat` 阻抗矩阵文本，求解失败时可能缺失。
    pub zc_mat: Option<String>,
}

impl SolverOutcome {
    #[inline]
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// 简单的忙碌标记：请求未返回前拒绝再次发起同一操作。
#[derive(Debug, Clone, Copy)]
pub struct BusyGate {
    action: &'static str,
    busy: bool,
}

impl BusyGate {
    pub const fn new(action: &'static str) -> Self {
        Self {
            action,
            busy: false,
        }
    }

    #[inline]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn try_begin(&mut self) -> Result<(), EngineError> {
        if self.busy {
            return Err(EngineError::Busy(self.action));
        }
        self.busy = true;
        debug!(action = self.action, "开始外部请求");
        Ok(())
    }

    pub fn finish(&mut self) -> Result<(), EngineError> {
        if !self.busy {
            return Err(EngineError::NoRequestInFlight(self.action));
        }
        self.busy = false;
        debug!(action = self.action, "外部请求已返回");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_set_options_become_flags_in_fixed_order() {
        let options = SolverOptions {
            solver: Some("iterative".to_string()),
            precond: Some("on".to_string()),
            tol: Some(1e-3),
            maxiters: Some(200),
            ..SolverOptions::default()
        };
        assert_eq!(
            options.to_args(),
            ["-s", "iterative", "-p", "on", "-t", "0.001", "-c", "200"]
        );
        assert!(SolverOptions::default().to_args().is_empty());
    }

    #[test]
    fn blank_text_options_are_skipped() {
        let options = SolverOptions {
            matvec: Some("  ".to_string()),
            order: Some(2),
            ..SolverOptions::default()
        };
        assert_eq!(options.to_args(), ["-o", "2"]);
    }

    #[test]
    fn gate_rejects_second_request_until_finished() {
        let mut gate = BusyGate::new("solver");
        assert!(matches!(gate.finish(), Err(EngineError::NoRequestInFlight("solver"))));
        gate.try_begin().unwrap();
        assert!(gate.is_busy());
        assert!(matches!(gate.try_begin(), Err(EngineError::Busy("solver"))));
        gate.finish().unwrap();
        assert!(!gate.is_busy());
        gate.try_begin().unwrap();
    }
}
