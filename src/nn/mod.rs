/*
 * @Author       : 老董
 * @Date         : 2026-02-09
 * @Description  : 负责LSTM计算核心（参数存储、前向引擎、反向引擎）的构建
 */

mod lstm;

pub use lstm::Lstm;
