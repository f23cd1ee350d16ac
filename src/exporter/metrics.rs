use super::ExportTally;
use crate::codec::EncodeBuffer;
use crate::data::{DataPoint, InstrumentationScope, Metric};
use crate::error::{EncodeError, Result};
use crate::otlp::{MetricsEncoder, MetricsSerializer, DEPTH_METRIC, DEPTH_SCOPE};
use crate::transport::DataTransport;
use std::sync::Arc;

/// Sends metric batches as OTLP `ExportMetricsServiceRequest` payloads.
///
/// Data points are packed into as few payloads as the buffer allows. A batch
/// that outgrows one payload is split between data points; each payload
/// repeats the resource, scope and metric headers of the points it carries.
#[derive(Debug)]
pub struct MetricExporter {
    serializer: MetricsSerializer,
    buffer: EncodeBuffer,
    transport: Arc<dyn DataTransport>,
}

impl MetricExporter {
    pub fn new(serializer: MetricsSerializer, transport: Arc<dyn DataTransport>) -> Self {
        MetricExporter {
            serializer,
            buffer: EncodeBuffer::new(),
            transport,
        }
    }

    pub(crate) fn with_capacity(mut self, capacity: usize) -> Self {
        self.buffer = EncodeBuffer::with_capacity(capacity);
        self
    }

    pub fn serializer(&self) -> &MetricsSerializer {
        &self.serializer
    }

    /// Encodes and sends every data point of `metrics`.
    ///
    /// Metrics are grouped by instrumentation scope in first-seen order. A
    /// point that cannot be encoded, or whose payload the transport rejects,
    /// is counted in [`Error::PartialFailure`](crate::Error::PartialFailure).
    pub fn export(&mut self, metrics: &[Metric<'_>]) -> Result<()> {
        if !self.transport.is_enabled() {
            return Ok(());
        }
        let total = metrics.iter().map(|m| m.data.data_point_count()).sum();
        let mut writer = MessageWriter {
            enc: self.serializer.encoder(&mut self.buffer),
            transport: &*self.transport,
            open: OpenLevels::default(),
            points: 0,
            tally: ExportTally::new(total),
        };

        for (group, (scope, members)) in group_by_scope(metrics).iter().enumerate() {
            for &index in members {
                let metric = &metrics[index];
                let at = OpenLevels {
                    scope: Some(group),
                    metric: Some(index),
                };
                for point in metric.data.data_points() {
                    writer.write(at, scope, metric, point);
                }
            }
        }
        writer.flush();
        writer.tally.finish()
    }
}

/// Indices of metrics sharing a scope name and version, in first-seen order.
fn group_by_scope<'a>(metrics: &[Metric<'a>]) -> Vec<(InstrumentationScope<'a>, Vec<usize>)> {
    let mut groups: Vec<(InstrumentationScope<'a>, Vec<usize>)> = Vec::new();
    for (index, metric) in metrics.iter().enumerate() {
        match groups.iter_mut().find(|(scope, _)| scope.same_scope(&metric.scope)) {
            Some((_, members)) => members.push(index),
            None => groups.push((metric.scope, vec![index])),
        }
    }
    groups
}

/// Which scope group and metric the open levels of the message belong to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct OpenLevels {
    scope: Option<usize>,
    metric: Option<usize>,
}

struct MessageWriter<'b> {
    enc: MetricsEncoder<'b>,
    transport: &'b dyn DataTransport,
    open: OpenLevels,
    /// Data points in the current message.
    points: usize,
    tally: ExportTally,
}

impl<'b> MessageWriter<'b> {
    fn write(
        &mut self,
        at: OpenLevels,
        scope: &InstrumentationScope<'_>,
        metric: &Metric<'_>,
        point: DataPoint<'_>,
    ) {
        let mut error = match self.try_write(at, scope, metric, point) {
            Ok(()) => return,
            Err(e) => e,
        };
        if error.is_overflow() && self.points > 0 {
            self.flush();
            match self.try_write(at, scope, metric, point) {
                Ok(()) => return,
                Err(e) => error = e,
            }
        }
        self.tally.dropped("data point", &error);
    }

    /// Writes `point`, opening whatever levels above it are not open yet. On
    /// error the message is left exactly as it was.
    fn try_write(
        &mut self,
        at: OpenLevels,
        scope: &InstrumentationScope<'_>,
        metric: &Metric<'_>,
        point: DataPoint<'_>,
    ) -> Result<(), EncodeError> {
        let checkpoint = self.enc.checkpoint();
        let open = self.open;
        let result = self
            .open_levels(at, scope, metric)
            .and_then(|()| self.enc.emit_data_point(point));
        match result {
            Ok(()) => {
                self.points += 1;
                Ok(())
            }
            Err(e) => {
                self.enc.rewind(checkpoint);
                self.open = open;
                Err(e)
            }
        }
    }

    fn open_levels(
        &mut self,
        at: OpenLevels,
        scope: &InstrumentationScope<'_>,
        metric: &Metric<'_>,
    ) -> Result<(), EncodeError> {
        if self.enc.depth() == 0 {
            self.enc.begin_resource()?;
            self.open = OpenLevels::default();
        }
        if self.open.scope != at.scope {
            self.enc.close_to(DEPTH_SCOPE);
            self.open.metric = None;
            self.enc.begin_scope(scope)?;
            self.open.scope = at.scope;
        }
        if self.open.metric != at.metric {
            self.enc.close_to(DEPTH_METRIC);
            self.enc.begin_metric(metric)?;
            self.enc.begin_instrument(&metric.data)?;
            self.open.metric = at.metric;
        }
        Ok(())
    }

    /// Sends the current message, if it holds any data point, and starts an
    /// empty one.
    fn flush(&mut self) {
        if self.points == 0 {
            return;
        }
        let payload = self.enc.payload();
        tracing::debug!(
            target: "etw_wire",
            points = self.points,
            bytes = payload.len(),
            "sending metrics payload"
        );
        if let Err(e) = self.transport.send(payload) {
            self.tally.send_failed(self.points, &e);
        }
        self.enc.reset();
        self.open = OpenLevels::default();
        self.points = 0;
    }
}
