use crate::extract::Embedding;
use crate::label::ReferenceItem;

/// 两个嵌入向量之间的欧氏距离
///
/// 不做任何归一化，距离阈值就是针对原始向量标定的。
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

/// 在参考集中线性扫描最近邻，返回下标和距离
///
/// 距离相同时保留先出现的一项；参考集为空时返回 `None`。
pub fn nearest(query: &[f32], refs: &[ReferenceItem]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, item) in refs.iter().enumerate() {
        let d = euclidean(query, &item.embedding);
        if best.is_none_or(|(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    best
}

/// 为单个查询向量分配身份
///
/// 最近邻距离超过阈值（边界值算通过），或最近邻是负例时返回 `None`。
pub fn assign(query: &[f32], refs: &[ReferenceItem], threshold: f32) -> Option<String> {
    let (i, d) = nearest(query, refs)?;
    if d <= threshold { refs[i].identity.clone() } else { None }
}

/// 最近邻分类，每个查询向量对应一个结果，顺序与输入一致
///
/// 参考集为空时所有查询都返回 `None`，这不是错误。
pub fn classify(
    queries: &[Embedding],
    refs: &[ReferenceItem],
    threshold: f32,
) -> Vec<Option<String>> {
    queries.iter().map(|q| assign(q, refs, threshold)).collect()
}
