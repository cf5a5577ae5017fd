/*
 * @Author       : 老董
 * @Date         : 2026-02-09
 * @Description  : LSTM核心的错误类型
 */

use thiserror::Error;

/// LSTM核心操作错误类型
///
/// 错误分类刻意保持极简：形状校验失败与缓存未就绪之外的一切数值现象
/// （激活饱和、浮点溢出乃至NaN/Inf）都按正常浮点行为传播，不视为错误。
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LstmError {
    /// 输入张量的形状与层配置（或批次/序列大小）不一致。
    /// 校验发生在任何缓存、梯度或缓冲被改写之前，失败时不会留下部分更新的状态。
    #[error("{message}：期望形状{expected:?}，实际形状{got:?}")]
    DimensionMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
        message: String,
    },

    /// 在没有形状匹配的前向缓存时调用了反向传播
    #[error("前向缓存未就绪：须先以相同的批次与序列长度执行forward，再调用backward")]
    UnpreparedState,
}
