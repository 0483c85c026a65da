use crate::{SloError, SloResult, UploadMode};

/// One planned segment: where its bytes come from and where they go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSegment {
    /// Position in the plan; determines manifest order
    pub index: usize,
    /// Byte offset into the payload
    pub offset: u64,
    /// Byte length of this segment
    pub len: u64,
    /// Object name for the segment within the container
    pub name: String,
}

/// Decides how a payload is divided into named, ordered segments.
///
/// Segment names carry a zero-padded part number starting at 1, so lexical
/// order equals numeric order. That matters for dynamic manifests, which
/// the service assembles by concatenating every object under the prefix in
/// lexical path order.
#[derive(Debug, Clone)]
pub struct SegmentPlanner {
    object_name: String,
    mode: UploadMode,
    segment_size_bytes: u64,
}

impl SegmentPlanner {
    pub fn new<S: Into<String>>(
        object_name: S,
        mode: UploadMode,
        segment_size_bytes: u64,
    ) -> SloResult<Self> {
        if segment_size_bytes == 0 {
            return Err(SloError::invalid("segment size must be at least 1 byte"));
        }
        let object_name = object_name.into();
        if object_name.is_empty() {
            return Err(SloError::invalid("object name must not be empty"));
        }
        Ok(Self {
            object_name,
            mode,
            segment_size_bytes,
        })
    }

    /// Lazily plan segments for a payload of the given total length.
    ///
    /// A payload smaller than the threshold yields exactly one segment; a
    /// zero-length payload yields none (a legal empty manifest downstream,
    /// not an error).
    pub fn plan(&self, total_len: u64) -> SegmentPlan<'_> {
        SegmentPlan {
            planner: self,
            total_len,
            offset: 0,
            index: 0,
        }
    }

    /// Number of segments `plan` will yield for the given payload length
    pub fn planned_count(&self, total_len: u64) -> usize {
        (total_len.div_ceil(self.segment_size_bytes)) as usize
    }

    fn segment_name(&self, part_number: u64) -> String {
        match self.mode {
            UploadMode::Static => format!("{}/{:08}", self.object_name, part_number),
            UploadMode::Dynamic => format!("{}/dlo/{:08}", self.object_name, part_number),
        }
    }
}

/// Lazy, finite, ordered sequence of planned segments
#[derive(Debug)]
pub struct SegmentPlan<'a> {
    planner: &'a SegmentPlanner,
    total_len: u64,
    offset: u64,
    index: usize,
}

impl Iterator for SegmentPlan<'_> {
    type Item = PlannedSegment;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.total_len {
            return None;
        }
        let len = (self.total_len - self.offset).min(self.planner.segment_size_bytes);
        let segment = PlannedSegment {
            index: self.index,
            offset: self.offset,
            len,
            name: self.planner.segment_name(self.index as u64 + 1),
        };
        self.offset += len;
        self.index += 1;
        Some(segment)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining =
            ((self.total_len - self.offset.min(self.total_len)).div_ceil(self.planner.segment_size_bytes)) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SegmentPlan<'_> {}
